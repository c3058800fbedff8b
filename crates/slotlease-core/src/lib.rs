//! Coordinator-free slot id allocation over a shared hash and a TTL mutex.
//!
//! Each process runs one [`LeaseAllocator`]. It scans the shared pool under a mutex,
//! reclaims abandoned entries, then either mints a fresh [`slotlease_model::SlotId`] or claims the
//! least recently refreshed live one, and keeps its claim alive with a background heartbeat.
pub mod allocator;
pub mod clock;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod store;

pub use allocator::{
    HeartbeatHandle, LeaseAllocator, LeaseState, ScanDecision, ScanPlan, plan_scan,
};
pub use clock::{Clock, ClockHandle, ManualClock, SystemClock, TokioClock};
pub use error::{LeaseError, LockError, StoreError};
pub use lock::{LockGuard, LockHandle, LockService, MemoryLockService};
pub use metrics::{
    ClaimOutcome, HeartbeatOutcome, LeaseMetrics, MetricsHandle, NoOpMetrics, noop_metrics,
};
pub use store::{MemoryPoolStore, PoolStore};

pub mod prelude {
    pub use crate::allocator::LeaseAllocator;
    pub use crate::error::LeaseError;
    pub use crate::lock::LockService;
    pub use crate::store::PoolStore;
    pub use slotlease_model::{LeaseConfig, SlotId};
}
