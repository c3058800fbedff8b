use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;

use slotlease_model::{EpochMs, LeaseConfig, SlotId};

use super::{LeaseAllocator, LeaseState};
use crate::{
    clock::{Clock, ManualClock, TokioClock},
    error::{LeaseError, LockError, StoreError},
    lock::{LockService, MemoryLockService},
    metrics::{ClaimOutcome, HeartbeatOutcome, LeaseMetrics},
    store::{MemoryPoolStore, PoolStore},
};

const T0: EpochMs = 1_700_000_000_000;
const POOL: &str = "fixed-id";
const HEARTBEAT: Duration = Duration::from_millis(3_000);

#[derive(Default)]
struct RecordingMetrics {
    claims: Mutex<Vec<ClaimOutcome>>,
    scans: Mutex<Vec<(usize, usize)>>,
    renewed: AtomicUsize,
    failed: AtomicUsize,
}

impl RecordingMetrics {
    fn claims(&self) -> Vec<ClaimOutcome> {
        self.claims.lock().unwrap().clone()
    }

    fn scans(&self) -> Vec<(usize, usize)> {
        self.scans.lock().unwrap().clone()
    }
}

impl LeaseMetrics for RecordingMetrics {
    fn record_scan(&self, expired: usize, live: usize) {
        self.scans.lock().unwrap().push((expired, live));
    }

    fn record_claim(&self, outcome: ClaimOutcome) {
        self.claims.lock().unwrap().push(outcome);
    }

    fn record_heartbeat(&self, outcome: HeartbeatOutcome) {
        match outcome {
            HeartbeatOutcome::Renewed => self.renewed.fetch_add(1, Ordering::SeqCst),
            HeartbeatOutcome::Failed => self.failed.fetch_add(1, Ordering::SeqCst),
        };
    }
}

struct Harness {
    store: MemoryPoolStore,
    locks: Arc<MemoryLockService>,
    metrics: Arc<RecordingMetrics>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: MemoryPoolStore::new(),
            locks: Arc::new(MemoryLockService::new()),
            metrics: Arc::new(RecordingMetrics::default()),
        }
    }

    fn allocator(&self, cfg: LeaseConfig, clock: impl Clock) -> LeaseAllocator {
        LeaseAllocator::new(cfg, Arc::new(self.store.clone()), self.locks.clone())
            .with_clock(Arc::new(clock))
            .with_metrics(self.metrics.clone())
    }

    fn last_seen(&self, slot: &str) -> Option<EpochMs> {
        self.store
            .snapshot(POOL)
            .get(slot)
            .map(|raw| raw.parse().unwrap())
    }
}

fn cfg(heartbeat_interval_ms: u64, dead_time_ms: u64) -> LeaseConfig {
    LeaseConfig {
        heartbeat_interval_ms,
        dead_time_ms,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn empty_pool_mints_exactly_one_slot() {
    let h = Harness::new();
    let mut alloc = h.allocator(LeaseConfig::default(), ManualClock::new(T0));

    let started = Instant::now();
    let slot = alloc.run().await.unwrap();

    let pool = h.store.snapshot(POOL);
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.get(slot.as_str()).map(String::as_str), Some("1700000000000"));
    assert_eq!(alloc.owned_slot(), Some(&slot));
    assert_eq!(alloc.state(), LeaseState::Owned);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(h.metrics.claims(), vec![ClaimOutcome::Minted]);
}

#[tokio::test(start_paused = true)]
async fn abandoned_slot_is_reclaimed_then_fresh_one_minted() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let mut alloc = h.allocator(cfg(500, 1_000), ManualClock::new(T0 + 1_500));
    let slot = alloc.run().await.unwrap();

    assert_ne!(slot.as_str(), "A");
    let pool = h.store.snapshot(POOL);
    assert_eq!(pool.len(), 1);
    assert!(pool.contains_key(slot.as_str()));
    assert_eq!(h.metrics.scans(), vec![(1, 0)]);
}

#[tokio::test(start_paused = true)]
async fn dead_time_below_default_heartbeat_still_reclaims() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let short = LeaseConfig {
        dead_time_ms: 1_000,
        ..Default::default()
    };
    let mut alloc = h.allocator(short, ManualClock::new(T0 + 1_500));
    let slot = alloc.run().await.unwrap();

    assert_ne!(slot.as_str(), "A");
    let pool = h.store.snapshot(POOL);
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.get(slot.as_str()).map(String::as_str), Some("1700000001500"));
    assert_eq!(h.metrics.claims(), vec![ClaimOutcome::Minted]);
}

#[tokio::test(start_paused = true)]
async fn idle_live_slot_is_adopted_without_waiting() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let mut alloc = h.allocator(cfg(3_000, 60_000), ManualClock::new(T0 + 10_000));
    let started = Instant::now();
    let slot = alloc.run().await.unwrap();

    assert_eq!(slot.as_str(), "A");
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(h.last_seen("A"), Some(T0 + 10_000));
    assert_eq!(h.metrics.claims(), vec![ClaimOutcome::Adopted]);
}

#[tokio::test(start_paused = true)]
async fn least_recently_refreshed_slot_is_chosen() {
    let h = Harness::new();
    h.store.insert(POOL, "A", (T0 + 100).to_string());
    h.store.insert(POOL, "B", (T0 + 50).to_string());
    h.store.insert(POOL, "C", (T0 + 200).to_string());

    let mut alloc = h.allocator(cfg(3_000, 60_000), ManualClock::new(T0 + 10_000));
    let slot = alloc.run().await.unwrap();

    assert_eq!(slot.as_str(), "B");
    assert_eq!(h.store.snapshot(POOL).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn fresh_slot_is_adopted_after_quiet_verification() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let mut alloc = h.allocator(cfg(3_000, 60_000), ManualClock::new(T0 + 500));
    let started = Instant::now();
    let slot = alloc.run().await.unwrap();

    assert_eq!(slot.as_str(), "A");
    assert!(started.elapsed() >= HEARTBEAT);
    assert_eq!(h.last_seen("A"), Some(T0 + 500));
    assert_eq!(h.metrics.claims(), vec![ClaimOutcome::Verified]);
}

#[tokio::test(start_paused = true)]
async fn fresh_slot_touched_during_verification_is_conceded() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let owner = h.store.clone();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        owner.hash_set(POOL, "A", &(T0 + 1_000).to_string()).await
    });

    let mut alloc = h.allocator(cfg(3_000, 60_000), ManualClock::new(T0 + 500));
    let slot = alloc.run().await.unwrap();
    writer.await.unwrap().unwrap();

    assert_ne!(slot.as_str(), "A");
    let pool = h.store.snapshot(POOL);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.get("A").map(String::as_str), Some("1700000001000"));
    assert_eq!(
        h.metrics.claims(),
        vec![ClaimOutcome::Conceded, ClaimOutcome::Minted]
    );
}

#[tokio::test(start_paused = true)]
async fn slot_deleted_during_verification_is_conceded() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let other = h.store.clone();
    let _deleter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        other.hash_delete(POOL, "A").await
    });

    let mut alloc = h.allocator(cfg(3_000, 60_000), ManualClock::new(T0 + 500));
    let slot = alloc.run().await.unwrap();

    assert_ne!(slot.as_str(), "A");
}

#[tokio::test(start_paused = true)]
async fn heartbeat_refreshes_once_per_interval() {
    let h = Harness::new();
    let clock = TokioClock::new(T0);
    let mut alloc = h.allocator(cfg(3_000, 60_000), clock);
    let slot = alloc.run().await.unwrap();
    let claimed_at = h.last_seen(slot.as_str()).unwrap();

    for round in 1..=3u64 {
        tokio::time::sleep(HEARTBEAT + Duration::from_millis(1)).await;
        let last_seen = h.last_seen(slot.as_str()).unwrap();
        assert!(last_seen > claimed_at, "round {round}: lease not renewed");
        assert!(
            clock.now_ms() - last_seen <= HEARTBEAT.as_millis() as u64,
            "round {round}: lease older than one interval"
        );
    }
    assert!(h.metrics.renewed.load(Ordering::SeqCst) >= 3);
    assert!(!alloc.heartbeat().unwrap().is_finished());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_on_store_failure() {
    let h = Harness::new();
    let mut alloc = h.allocator(cfg(3_000, 60_000), TokioClock::new(T0));
    alloc.run().await.unwrap();

    h.store.set_failing(true);
    tokio::time::timeout(HEARTBEAT * 2, alloc.heartbeat().unwrap().stopped())
        .await
        .expect("failed write should stop the heartbeat");
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(alloc.heartbeat().unwrap().is_finished());
    assert_eq!(h.metrics.failed.load(Ordering::SeqCst), 1);
    assert!(matches!(
        alloc.shutdown().await,
        Err(LeaseError::Store(StoreError::Unavailable(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_renewals() {
    let h = Harness::new();
    let mut alloc = h.allocator(cfg(3_000, 60_000), TokioClock::new(T0));
    let slot = alloc.run().await.unwrap();

    alloc.shutdown().await.unwrap();
    assert_eq!(alloc.state(), LeaseState::Stopped);
    assert!(alloc.heartbeat().is_none());

    let writes = h.store.writes();
    tokio::time::sleep(HEARTBEAT * 3).await;
    assert_eq!(h.store.writes(), writes);
    assert!(h.last_seen(slot.as_str()).is_some());
}

#[tokio::test(start_paused = true)]
async fn second_run_is_rejected() {
    let h = Harness::new();
    let mut alloc = h.allocator(LeaseConfig::default(), ManualClock::new(T0));
    let slot = alloc.run().await.unwrap();

    let err = alloc.run().await.unwrap_err();
    assert!(matches!(err, LeaseError::AlreadyOwned(ref s) if *s == slot));
    assert_eq!(h.store.snapshot(POOL).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected_before_touching_the_pool() {
    let h = Harness::new();
    let bad = LeaseConfig {
        lock_ttl_ms: 0,
        ..Default::default()
    };
    let mut alloc = h.allocator(bad, ManualClock::new(T0));

    assert!(matches!(alloc.run().await, Err(LeaseError::Model(_))));
    assert_eq!(h.store.writes(), 0);
    assert_eq!(alloc.state(), LeaseState::Unclaimed);
}

#[tokio::test(start_paused = true)]
async fn scan_lock_is_released_after_decision() {
    let h = Harness::new();
    let mut alloc = h.allocator(LeaseConfig::default(), ManualClock::new(T0));
    alloc.run().await.unwrap();

    assert!(!h.locks.is_held("fixed-id-lock"));
}

#[tokio::test(start_paused = true)]
async fn scan_lock_is_not_held_during_verification() {
    let h = Harness::new();
    h.store.insert(POOL, "A", T0.to_string());

    let locks = h.locks.clone();
    let watcher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        locks.is_held("fixed-id-lock")
    });

    let mut alloc = h.allocator(cfg(3_000, 60_000), ManualClock::new(T0 + 500));
    alloc.run().await.unwrap();

    assert!(!watcher.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn store_failure_inside_scan_releases_lock() {
    let h = Harness::new();
    h.store.set_failing(true);
    let mut alloc = h.allocator(LeaseConfig::default(), ManualClock::new(T0));

    let err = alloc.run().await.unwrap_err();
    assert!(matches!(err, LeaseError::Store(_)));
    assert!(alloc.owned_slot().is_none());
    assert!(!h.locks.is_held("fixed-id-lock"));
}

#[tokio::test(start_paused = true)]
async fn contended_lock_surfaces_from_run() {
    let h = Harness::new();
    let locks = Arc::new(MemoryLockService::new().with_retry(2, Duration::from_millis(10)));
    let _held = locks
        .acquire("fixed-id-lock", Duration::from_secs(60))
        .await
        .unwrap();

    let mut alloc = LeaseAllocator::new(
        LeaseConfig::default(),
        Arc::new(h.store.clone()),
        locks.clone(),
    )
    .with_clock(Arc::new(ManualClock::new(T0)));

    let err = alloc.run().await.unwrap_err();
    assert!(matches!(err, LeaseError::Lock(LockError::Contended { .. })));
    assert!(alloc.owned_slot().is_none());
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn racing_instances_end_with_distinct_slots() {
    let h = Harness::new();
    let cfg = cfg(3_000, 60_000);
    let clock = TokioClock::new(T0);

    let mut first = h.allocator(cfg.clone(), clock);
    let mut second = h.allocator(cfg, clock);

    let (a, b) = tokio::join!(first.run(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        second.run().await
    });
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a, b);
    assert_eq!(h.store.snapshot(POOL).len(), 2);
    assert_eq!(
        h.metrics.claims(),
        vec![
            ClaimOutcome::Minted,
            ClaimOutcome::Conceded,
            ClaimOutcome::Minted
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn many_instances_against_idle_pool_get_distinct_slots() {
    let h = Harness::new();
    for id in ["s1", "s2", "s3"] {
        h.store.insert(POOL, id, T0.to_string());
    }
    let clock = TokioClock::new(T0 + 10_000);

    let mut owned: Vec<SlotId> = Vec::new();
    for _ in 0..4 {
        let mut alloc = h.allocator(cfg(3_000, 60_000), clock);
        owned.push(alloc.run().await.unwrap());
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let mut distinct = owned.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), 4);
    assert_eq!(
        &owned[..3],
        &[SlotId::from("s1"), SlotId::from("s2"), SlotId::from("s3")]
    );
}
