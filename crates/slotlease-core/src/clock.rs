//! Time sources for `last-seen` timestamps.
//!
//! The allocator compares timestamps written by many processes, so production code
//! uses the wall clock. Tests swap in [`ManualClock`] or [`TokioClock`].
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use slotlease_model::EpochMs;

/// Source of epoch-millisecond timestamps.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> EpochMs;
}

/// Shared handle to a clock.
pub type ClockHandle = Arc<dyn Clock>;

/// Wall clock (`SystemTime`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as EpochMs)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: EpochMs) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn set(&self, now: EpochMs) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> EpochMs {
        self.now.load(Ordering::SeqCst)
    }
}

/// Epoch clock driven by tokio's timer.
///
/// Anchored at `base` when created and advanced by `tokio::time::Instant`, so under
/// paused test time it moves exactly as far as the runtime's sleeps do.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    base: EpochMs,
}

impl TokioClock {
    pub fn new(base: EpochMs) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            base,
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> EpochMs {
        self.base + self.origin.elapsed().as_millis() as EpochMs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();

        clock.advance(Duration::from_millis(250));
        assert_eq!(other.now_ms(), 1_250);

        other.set(5);
        assert_eq!(clock.now_ms(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new(10_000);
        assert_eq!(clock.now_ms(), 10_000);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 11_500);
    }
}
