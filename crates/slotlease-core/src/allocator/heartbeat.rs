use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use slotlease_model::SlotId;

use crate::{
    clock::ClockHandle,
    error::LeaseError,
    metrics::{HeartbeatOutcome, MetricsHandle},
    store::PoolStore,
};

/// Everything the renewal loop needs, detached from the allocator.
pub(crate) struct HeartbeatContext {
    pub store: Arc<dyn PoolStore>,
    pub clock: ClockHandle,
    pub metrics: MetricsHandle,
    pub pool_key: String,
    pub slot: SlotId,
    pub interval: Duration,
}

/// Background lease renewal for an owned slot.
///
/// The loop sleeps one interval, writes `last-seen = now`, and repeats until cancelled.
/// A store error ends the loop and is returned from [`HeartbeatHandle::join`]; the
/// lease then lapses and other instances eventually reclaim the slot.
///
/// Dropping the handle does not stop the loop.
#[derive(Debug)]
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<(), LeaseError>>,
}

impl HeartbeatHandle {
    pub(crate) fn spawn(ctx: HeartbeatContext) -> Self {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(heartbeat_loop(ctx, cancel.clone()));
        Self { cancel, join }
    }

    /// `true` once the loop has exited (cancelled or failed).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Ask the loop to stop after the current write.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the loop was asked to stop or gave up after a failed write.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await
    }

    /// Wait for the loop to exit and return how it ended.
    pub async fn join(self) -> Result<(), LeaseError> {
        match self.join.await {
            Ok(res) => res,
            Err(e) => Err(LeaseError::HeartbeatAborted(e.to_string())),
        }
    }

    /// Stop the loop and wait for it.
    pub async fn shutdown(self) -> Result<(), LeaseError> {
        self.stop();
        self.join().await
    }
}

async fn heartbeat_loop(ctx: HeartbeatContext, cancel: CancellationToken) -> Result<(), LeaseError> {
    debug!(slot = %ctx.slot, interval_ms = ctx.interval.as_millis() as u64, "heartbeat started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(slot = %ctx.slot, "heartbeat stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(ctx.interval) => {}
        }

        let now = ctx.clock.now_ms();
        match ctx
            .store
            .hash_set(&ctx.pool_key, ctx.slot.as_str(), &now.to_string())
            .await
        {
            Ok(()) => {
                ctx.metrics.record_heartbeat(HeartbeatOutcome::Renewed);
                trace!(slot = %ctx.slot, last_seen = now, "lease renewed");
            }
            Err(e) => {
                ctx.metrics.record_heartbeat(HeartbeatOutcome::Failed);
                error!(slot = %ctx.slot, error = %e, "heartbeat write failed; lease will lapse");
                cancel.cancel();
                return Err(e.into());
            }
        }
    }
}
