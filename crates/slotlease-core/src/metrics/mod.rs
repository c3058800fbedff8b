//! Metrics collection abstraction for the lease allocator.
//!
//! Backends (prometheus, statsd, etc) implement [`LeaseMetrics`] and are injected via
//! [`crate::LeaseAllocator::with_metrics`].
mod backend;
pub use backend::{ClaimOutcome, HeartbeatOutcome, LeaseMetrics, MetricsHandle};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
