use crate::metrics::backend::{ClaimOutcome, HeartbeatOutcome, LeaseMetrics};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl LeaseMetrics for NoOpMetrics {
    #[inline(always)]
    fn record_scan(&self, _: usize, _: usize) {}

    #[inline(always)]
    fn record_claim(&self, _: ClaimOutcome) {}

    #[inline(always)]
    fn record_heartbeat(&self, _: HeartbeatOutcome) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_is_zero_size() {
        assert_eq!(std::mem::size_of::<NoOpMetrics>(), 0);
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ClaimOutcome::Minted.as_label(), "minted");
        assert_eq!(ClaimOutcome::Adopted.as_label(), "adopted");
        assert_eq!(ClaimOutcome::Verified.as_label(), "verified");
        assert_eq!(ClaimOutcome::Conceded.as_label(), "conceded");
        assert_eq!(HeartbeatOutcome::Renewed.as_label(), "renewed");
        assert_eq!(HeartbeatOutcome::Failed.as_label(), "failed");
    }
}
