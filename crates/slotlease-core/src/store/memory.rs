use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tracing::trace;

use crate::{error::StoreError, store::PoolStore};

/// In-process [`PoolStore`] backed by a hash of hashes.
///
/// Clones share state, so several allocators in one process can race on the same pool.
/// [`MemoryPoolStore::set_failing`] makes every operation fail with
/// [`StoreError::Unavailable`], simulating an unreachable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPoolStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
    failing: AtomicBool,
    writes: AtomicU64,
}

impl MemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the simulated outage.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Seed a field directly, bypassing failure mode and write accounting.
    pub fn insert(&self, key: &str, field: &str, value: impl Into<String>) {
        self.hashes()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }

    /// Copy of the hash stored under `key`.
    pub fn snapshot(&self, key: &str) -> HashMap<String, String> {
        self.hashes().get(key).cloned().unwrap_or_default()
    }

    /// Number of successful `hash_set` calls so far.
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn hashes(&self) -> MutexGuard<'_, HashMap<String, HashMap<String, String>>> {
        self.inner
            .hashes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is in failing mode".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        trace!(key, field, value, "hset");
        self.hashes()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.hashes().get(key).and_then(|h| h.get(field)).cloned())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check()?;
        Ok(self.snapshot(key))
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        self.check()?;
        trace!(key, field, "hdel");
        let mut hashes = self.hashes();
        if let Some(hash) = hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                hashes.remove(key);
            }
        }
        Ok(())
    }
}
