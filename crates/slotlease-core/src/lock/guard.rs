use std::{fmt, sync::Arc, time::Duration};

use tracing::{trace, warn};

use crate::{
    error::LockError,
    lock::{LockHandle, LockService},
};

/// Scoped lock acquisition.
///
/// Call [`LockGuard::release`] on the normal path. If the guard is dropped while still
/// holding the lock (an early `?` return, or the owning future being cancelled) the
/// release is spawned onto the current tokio runtime instead.
pub struct LockGuard {
    service: Arc<dyn LockService>,
    handle: Option<LockHandle>,
}

impl LockGuard {
    pub async fn acquire(
        service: Arc<dyn LockService>,
        name: &str,
        ttl: Duration,
    ) -> Result<Self, LockError> {
        let handle = service.acquire(name, ttl).await?;
        trace!(lock = %handle.name(), ttl_ms = ttl.as_millis() as u64, "lock acquired");

        Ok(Self {
            service,
            handle: Some(handle),
        })
    }

    /// The held lock, `None` once released.
    pub fn handle(&self) -> Option<&LockHandle> {
        self.handle.as_ref()
    }

    /// Release the lock now.
    pub async fn release(mut self) -> Result<(), LockError> {
        match self.handle.take() {
            Some(handle) => {
                self.service.release(&handle).await?;
                trace!(lock = %handle.name(), "lock released");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let service = Arc::clone(&self.service);
                rt.spawn(async move {
                    if let Err(e) = service.release(&handle).await {
                        warn!(lock = %handle.name(), error = %e, "deferred lock release failed");
                    } else {
                        trace!(lock = %handle.name(), "lock released on drop");
                    }
                });
            }
            Err(_) => {
                warn!(lock = %handle.name(), "guard dropped outside runtime; lock left to ttl");
            }
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("handle", &self.handle)
            .field("service", &"<service>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryLockService;

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn release_frees_the_lock() {
        let locks = Arc::new(MemoryLockService::new());
        let guard = LockGuard::acquire(locks.clone(), "pool-lock", TTL)
            .await
            .unwrap();
        assert!(locks.is_held("pool-lock"));
        assert_eq!(guard.handle().map(LockHandle::name), Some("pool-lock"));

        guard.release().await.unwrap();
        assert!(!locks.is_held("pool-lock"));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_releases_in_background() {
        let locks = Arc::new(MemoryLockService::new());
        {
            let _guard = LockGuard::acquire(locks.clone(), "pool-lock", TTL)
                .await
                .unwrap();
        }
        tokio::task::yield_now().await;

        assert!(!locks.is_held("pool-lock"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_holder_does_not_leak_the_lock() {
        let locks = Arc::new(MemoryLockService::new());
        let svc: Arc<dyn LockService> = locks.clone();

        let holder = tokio::spawn(async move {
            let _guard = LockGuard::acquire(svc, "pool-lock", TTL).await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tokio::task::yield_now().await;
        assert!(locks.is_held("pool-lock"));

        holder.abort();
        let _ = holder.await;
        tokio::task::yield_now().await;

        assert!(!locks.is_held("pool-lock"));
    }
}
