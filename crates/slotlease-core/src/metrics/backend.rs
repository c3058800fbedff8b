use std::sync::Arc;

/// How a claim attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A fresh slot id was minted and adopted.
    Minted,
    /// An idle slot was adopted without a verification wait.
    Adopted,
    /// A recently refreshed slot was adopted after the verification wait.
    Verified,
    /// Another writer touched the slot during verification; it was given up.
    Conceded,
}

impl ClaimOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            ClaimOutcome::Minted => "minted",
            ClaimOutcome::Adopted => "adopted",
            ClaimOutcome::Verified => "verified",
            ClaimOutcome::Conceded => "conceded",
        }
    }
}

/// Result of one heartbeat write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Renewed,
    Failed,
}

impl HeartbeatOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            HeartbeatOutcome::Renewed => "renewed",
            HeartbeatOutcome::Failed => "failed",
        }
    }
}

/// Backend metrics collection interface.
pub trait LeaseMetrics: Send + Sync + 'static {
    /// Record a completed pool scan.
    ///
    /// # Arguments
    /// - `expired`: entries deleted as abandoned
    /// - `live`: entries left in the pool that were considered for claiming
    fn record_scan(&self, expired: usize, live: usize);
    /// Record the end of a claim attempt.
    fn record_claim(&self, outcome: ClaimOutcome);
    /// Record a single heartbeat write.
    fn record_heartbeat(&self, outcome: HeartbeatOutcome);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn LeaseMetrics>;
