use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::trace;

use crate::{
    error::LockError,
    lock::{LockHandle, LockService},
};

/// Default number of retries after the first failed attempt.
pub const MEMORY_LOCK_RETRY_COUNT: u32 = 10;

/// Default delay between attempts.
pub const MEMORY_LOCK_RETRY_DELAY: Duration = Duration::from_millis(200);

/// In-process TTL mutex.
///
/// Expiry is measured with `tokio::time::Instant`, so paused-time tests see locks lapse
/// exactly when the runtime clock passes the TTL.
#[derive(Debug)]
pub struct MemoryLockService {
    held: Mutex<HashMap<String, Held>>,
    seq: AtomicU64,
    retry_count: u32,
    retry_delay: Duration,
}

#[derive(Debug)]
struct Held {
    token: String,
    expires_at: Instant,
}

impl Default for MemoryLockService {
    fn default() -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(1),
            retry_count: MEMORY_LOCK_RETRY_COUNT,
            retry_delay: MEMORY_LOCK_RETRY_DELAY,
        }
    }
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retry budget.
    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    /// `true` while a non-expired holder exists for `name`.
    pub fn is_held(&self, name: &str) -> bool {
        self.held()
            .get(name)
            .is_some_and(|h| h.expires_at > Instant::now())
    }

    fn held(&self) -> MutexGuard<'_, HashMap<String, Held>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self, name: &str, ttl: Duration) -> Option<LockHandle> {
        let now = Instant::now();
        let mut held = self.held();

        if held.get(name).is_some_and(|h| h.expires_at > now) {
            return None;
        }
        let token = format!("mem-{:x}", self.seq.fetch_add(1, Ordering::Relaxed));
        held.insert(
            name.to_string(),
            Held {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Some(LockHandle::new(name, token))
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<LockHandle, LockError> {
        let attempts = self.retry_count + 1;
        for attempt in 1..=attempts {
            if let Some(handle) = self.try_acquire(name, ttl) {
                return Ok(handle);
            }
            trace!(lock = name, attempt, "lock busy");
            if attempt < attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(LockError::Contended {
            name: name.to_string(),
            attempts,
        })
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        let mut held = self.held();
        if held
            .get(handle.name())
            .is_some_and(|h| h.token == handle.token())
        {
            held.remove(handle.name());
        }
        Ok(())
    }
}
