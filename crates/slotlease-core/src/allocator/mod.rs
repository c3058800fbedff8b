//! Lease allocator state machine.
//!
//! `run()` drives one instance from `Unclaimed` to `Owned`:
//! 1. `scan` under the pool mutex: read the pool, delete expired entries, pick a candidate.
//! 2. The mutex is released, then either `register` (mint) or `claim` an existing entry.
//! 3. A claim on a recently refreshed entry writes a reservation, waits one heartbeat
//!    interval and re-reads it; if somebody else wrote in between, the slot is conceded
//!    and a fresh one is minted instead.
//! 4. The adopted slot is renewed by a background [`HeartbeatHandle`].
mod heartbeat;
pub use heartbeat::HeartbeatHandle;

mod plan;
pub use plan::{ScanDecision, ScanPlan, plan_scan};

mod state;
pub use state::LeaseState;

#[cfg(test)]
mod tests;

use std::{fmt, sync::Arc};

use tracing::{debug, error, info, instrument, warn};

use slotlease_model::{EpochMs, LeaseConfig, SlotId, parse_last_seen};

use crate::{
    clock::{ClockHandle, SystemClock},
    error::LeaseError,
    lock::{LockGuard, LockService},
    metrics::{ClaimOutcome, MetricsHandle, noop_metrics},
    store::PoolStore,
};

use heartbeat::HeartbeatContext;

/// Outcome of a single `claim` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimVerdict {
    Adopted,
    Conceded,
}

/// Per-process slot id allocator.
pub struct LeaseAllocator {
    cfg: LeaseConfig,
    store: Arc<dyn PoolStore>,
    locks: Arc<dyn LockService>,
    clock: ClockHandle,
    metrics: MetricsHandle,
    state: LeaseState,
    owned: Option<SlotId>,
    heartbeat: Option<HeartbeatHandle>,
}

impl LeaseAllocator {
    /// Create an allocator using the wall clock and no metrics.
    pub fn new(cfg: LeaseConfig, store: Arc<dyn PoolStore>, locks: Arc<dyn LockService>) -> Self {
        Self {
            cfg,
            store,
            locks,
            clock: Arc::new(SystemClock),
            metrics: noop_metrics(),
            state: LeaseState::Unclaimed,
            owned: None,
            heartbeat: None,
        }
    }

    /// Replace the time source and return updated allocator.
    pub fn with_clock(mut self, clock: ClockHandle) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the metrics backend and return updated allocator.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.cfg
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// The adopted slot id, once `run()` has succeeded.
    pub fn owned_slot(&self) -> Option<&SlotId> {
        self.owned.as_ref()
    }

    /// The running renewal loop, if any.
    pub fn heartbeat(&self) -> Option<&HeartbeatHandle> {
        self.heartbeat.as_ref()
    }

    /// Acquire a slot id and start renewing it.
    ///
    /// Returns [`LeaseError::AlreadyOwned`] if this instance already holds one.
    #[instrument(level = "debug", skip(self), fields(pool = %self.cfg.pool_key))]
    pub async fn run(&mut self) -> Result<SlotId, LeaseError> {
        if let Some(slot) = &self.owned {
            return Err(LeaseError::AlreadyOwned(slot.clone()));
        }
        self.cfg.validate()?;
        if self.cfg.dead_time_within_heartbeat() {
            warn!(
                dead_time_ms = self.cfg.dead_time_ms,
                heartbeat_interval_ms = self.cfg.heartbeat_interval_ms,
                "dead time does not exceed heartbeat interval; live slots may be reclaimed"
            );
        }

        let mut decision = self.scan().await?;
        let slot = loop {
            let (slot, needs_verification, minted) = match decision {
                ScanDecision::Mint => (self.register().await?, false, true),
                ScanDecision::Claim {
                    slot,
                    needs_verification,
                    ..
                } => (slot, needs_verification, false),
            };

            match self.claim(&slot, needs_verification).await? {
                ClaimVerdict::Adopted => {
                    let outcome = match (minted, needs_verification) {
                        (true, _) => ClaimOutcome::Minted,
                        (false, true) => ClaimOutcome::Verified,
                        (false, false) => ClaimOutcome::Adopted,
                    };
                    self.metrics.record_claim(outcome);
                    break slot;
                }
                ClaimVerdict::Conceded => {
                    self.metrics.record_claim(ClaimOutcome::Conceded);
                    decision = ScanDecision::Mint;
                }
            }
        };

        self.adopt(slot.clone());
        info!(slot = %slot, "slot id adopted");
        Ok(slot)
    }

    /// Stop renewing the owned slot.
    ///
    /// The pool entry is left in place; it ages out like any abandoned lease.
    /// Returns the heartbeat's own error if it had already failed.
    pub async fn shutdown(&mut self) -> Result<(), LeaseError> {
        let Some(heartbeat) = self.heartbeat.take() else {
            return Ok(());
        };
        self.transition(LeaseState::Stopped);
        heartbeat.shutdown().await
    }

    /// Inspect the pool under the mutex and decide what to claim.
    ///
    /// Expired entries are deleted while the lock is held. The lock is released before
    /// returning, on success and on error alike.
    async fn scan(&mut self) -> Result<ScanDecision, LeaseError> {
        self.transition(LeaseState::Scanning);

        let guard = LockGuard::acquire(
            Arc::clone(&self.locks),
            &self.cfg.lock_name(),
            self.cfg.lock_ttl(),
        )
        .await?;

        let result = self.inspect_pool().await;
        if let Err(e) = &result {
            error!(pool = %self.cfg.pool_key, error = %e, "pool scan failed under lock");
        }
        if let Err(e) = guard.release().await {
            warn!(pool = %self.cfg.pool_key, error = %e, "scan lock release failed; left to ttl");
        }
        result
    }

    async fn inspect_pool(&self) -> Result<ScanDecision, LeaseError> {
        let key = &self.cfg.pool_key;
        let entries = self.store.hash_get_all(key).await?;
        let now = self.clock.now_ms();

        let plan = plan_scan(&entries, now, &self.cfg);
        for slot in &plan.expired {
            self.store.hash_delete(key, slot.as_str()).await?;
            debug!(slot = %slot, "expired slot reclaimed");
        }
        self.metrics.record_scan(plan.expired.len(), plan.live);

        match &plan.decision {
            ScanDecision::Mint => info!(
                expired = plan.expired.len(),
                live = plan.live,
                "no live slot in pool; minting"
            ),
            ScanDecision::Claim {
                slot,
                last_seen,
                needs_verification,
            } => info!(
                expired = plan.expired.len(),
                live = plan.live,
                slot = %slot,
                age_ms = now.saturating_sub(*last_seen),
                needs_verification,
                "claim candidate selected"
            ),
        }
        Ok(plan.decision)
    }

    /// Mint a fresh slot id and write it to the pool.
    async fn register(&mut self) -> Result<SlotId, LeaseError> {
        self.transition(LeaseState::Registering);

        let slot = SlotId::generate();
        self.write_last_seen(&slot).await?;
        debug!(slot = %slot, "slot id minted");
        Ok(slot)
    }

    /// Reserve `slot`, verifying it first when it may still be owned.
    async fn claim(
        &mut self,
        slot: &SlotId,
        needs_verification: bool,
    ) -> Result<ClaimVerdict, LeaseError> {
        self.transition(LeaseState::Claiming);

        let reserved = self.write_last_seen(slot).await?;
        if !needs_verification {
            return Ok(ClaimVerdict::Adopted);
        }

        self.transition(LeaseState::Verifying);
        tokio::time::sleep(self.cfg.heartbeat_interval()).await;

        let current = self
            .store
            .hash_get(&self.cfg.pool_key, slot.as_str())
            .await?;
        let observed = current
            .as_deref()
            .and_then(|raw| parse_last_seen(slot.as_str(), raw).ok());

        if observed == Some(reserved) {
            debug!(slot = %slot, "reservation held through verification");
            Ok(ClaimVerdict::Adopted)
        } else {
            info!(
                slot = %slot,
                reserved,
                observed = ?observed,
                "slot touched by another writer; conceding"
            );
            Ok(ClaimVerdict::Conceded)
        }
    }

    async fn write_last_seen(&self, slot: &SlotId) -> Result<EpochMs, LeaseError> {
        let now = self.clock.now_ms();
        self.store
            .hash_set(&self.cfg.pool_key, slot.as_str(), &now.to_string())
            .await?;
        Ok(now)
    }

    fn adopt(&mut self, slot: SlotId) {
        self.heartbeat = Some(HeartbeatHandle::spawn(HeartbeatContext {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            metrics: Arc::clone(&self.metrics),
            pool_key: self.cfg.pool_key.clone(),
            slot: slot.clone(),
            interval: self.cfg.heartbeat_interval(),
        }));
        self.owned = Some(slot);
        self.transition(LeaseState::Owned);
    }

    fn transition(&mut self, next: LeaseState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "lease state transition");
            self.state = next;
        }
    }
}

impl fmt::Debug for LeaseAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseAllocator")
            .field("pool_key", &self.cfg.pool_key)
            .field("state", &self.state)
            .field("owned", &self.owned)
            .field("heartbeat", &self.heartbeat.as_ref().map(|_| "<running>"))
            .finish()
    }
}
