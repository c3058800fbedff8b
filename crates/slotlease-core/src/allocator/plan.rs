use std::collections::HashMap;

use tracing::warn;

use slotlease_model::{EpochMs, LeaseConfig, SlotId, parse_last_seen};

/// What the scan decided the allocator should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    /// No live entry left: mint a fresh slot id.
    Mint,
    /// Claim the least recently refreshed live entry.
    Claim {
        slot: SlotId,
        last_seen: EpochMs,
        /// The entry was refreshed less than one heartbeat ago and may still be owned.
        needs_verification: bool,
    },
}

/// Result of inspecting a pool snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    /// Entries to delete as abandoned, in slot id order.
    pub expired: Vec<SlotId>,
    /// Number of entries that survived the dead-time check.
    pub live: usize,
    pub decision: ScanDecision,
}

/// Decide what to do with a pool snapshot taken at `now`.
///
/// - an entry older than `dead-time` is expired; so is one whose value does not parse,
///   since no owner can ever renew it into a valid lease;
/// - the candidate is the minimum live `last-seen`, ties broken by slot id;
/// - the candidate needs verification when it was refreshed less than one heartbeat
///   interval ago. Timestamps ahead of `now` count as just refreshed.
///
/// An owner whose renewal stalled past `dead-time` can lose its entry here and recreate it
/// with its next heartbeat. Expired ids are never candidates, so the scanner that deleted
/// one does not also claim it.
pub fn plan_scan(entries: &HashMap<String, String>, now: EpochMs, cfg: &LeaseConfig) -> ScanPlan {
    let mut expired = Vec::new();
    let mut live: Vec<(EpochMs, SlotId)> = Vec::with_capacity(entries.len());

    for (field, raw) in entries {
        let slot = SlotId::from(field.as_str());
        match parse_last_seen(field, raw) {
            Ok(last_seen) if now.saturating_sub(last_seen) > cfg.dead_time_ms => {
                expired.push(slot)
            }
            Ok(last_seen) => live.push((last_seen, slot)),
            Err(e) => {
                warn!(slot = %slot, error = %e, "unreadable pool entry treated as expired");
                expired.push(slot);
            }
        }
    }
    expired.sort();

    let live_count = live.len();
    let decision = match live.into_iter().min() {
        None => ScanDecision::Mint,
        Some((last_seen, slot)) => ScanDecision::Claim {
            needs_verification: now.saturating_sub(last_seen) < cfg.heartbeat_interval_ms,
            slot,
            last_seen,
        },
    };

    ScanPlan {
        expired,
        live: live_count,
        decision,
    }
}
