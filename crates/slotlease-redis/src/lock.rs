use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use redis::{Script, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use slotlease_core::{LockError, LockHandle, LockService};

use crate::error::{RedisBackendError, lock_error};

/// Deletes the lock key only if it still carries our token.
const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Fixed drift allowance added on top of `ttl * drift_factor` (milliseconds).
const DRIFT_CONSTANT_MS: u64 = 2;

/// Retry and validity policy for [`RedisLockService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RedisLockConfig {
    /// Attempts after the first one before giving up.
    pub retry_count: u32,
    /// Base delay between attempts.
    pub retry_delay_ms: u64,
    /// Upper bound of the random delay added to each retry.
    pub retry_jitter_ms: u64,
    /// Share of the TTL reserved for clock drift between client and server.
    pub drift_factor: f64,
}

impl Default for RedisLockConfig {
    fn default() -> Self {
        Self {
            retry_count: 10,
            retry_delay_ms: 200,
            retry_jitter_ms: 200,
            drift_factor: 0.01,
        }
    }
}

impl RedisLockConfig {
    pub fn validate(&self) -> Result<(), RedisBackendError> {
        if !(0.0..1.0).contains(&self.drift_factor) {
            return Err(RedisBackendError::InvalidConfig(format!(
                "drift-factor must be in [0, 1), got {}",
                self.drift_factor
            )));
        }
        Ok(())
    }

    /// Time a fresh lock must still have left to be considered valid.
    pub fn drift(&self, ttl: Duration) -> Duration {
        let ttl_ms = ttl.as_millis() as f64;
        Duration::from_millis((ttl_ms * self.drift_factor) as u64 + DRIFT_CONSTANT_MS)
    }

    /// Remaining validity of a lock set `elapsed` after the attempt started.
    ///
    /// `None` when the lock would expire before it can be relied on; the caller must
    /// release it and treat the attempt as failed.
    pub fn validity(&self, ttl: Duration, elapsed: Duration) -> Option<Duration> {
        let remaining = ttl.saturating_sub(elapsed + self.drift(ttl));
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Delay before the next attempt: base delay plus uniform jitter.
    pub fn retry_wait(&self) -> Duration {
        let jitter = if self.retry_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.retry_jitter_ms)
        };
        Duration::from_millis(self.retry_delay_ms + jitter)
    }
}

/// Single-instance Redlock over a managed connection.
#[derive(Clone)]
pub struct RedisLockService {
    conn: ConnectionManager,
    cfg: RedisLockConfig,
    unlock: Script,
}

impl RedisLockService {
    pub fn new(conn: ConnectionManager, cfg: RedisLockConfig) -> Self {
        Self {
            conn,
            cfg,
            unlock: Script::new(UNLOCK_SCRIPT),
        }
    }

    /// One `SET NX PX` attempt. `Ok(true)` when the key was set.
    async fn try_set(&self, name: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(lock_error)?;
        Ok(reply.is_some())
    }

    async fn unlock(&self, name: &str, token: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .unlock
            .key(name)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(lock_error)?;
        Ok(deleted == 1)
    }
}

#[async_trait]
impl LockService for RedisLockService {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<LockHandle, LockError> {
        let token = Uuid::new_v4().simple().to_string();
        let drift = self.cfg.drift(ttl);
        let attempts = self.cfg.retry_count + 1;

        for attempt in 1..=attempts {
            let started = Instant::now();
            if self.try_set(name, &token, ttl).await? {
                if let Some(validity) = self.cfg.validity(ttl, started.elapsed()) {
                    debug!(
                        lock = name,
                        attempt,
                        validity_ms = validity.as_millis() as u64,
                        "lock acquired"
                    );
                    return Ok(LockHandle::new(name, token));
                }
                warn!(lock = name, attempt, "lock acquired too late to be valid; releasing");
                self.unlock(name, &token).await?;
            } else {
                trace!(lock = name, attempt, "lock busy");
            }

            if attempt < attempts {
                let wait = self.cfg.retry_wait();
                tokio::time::sleep(wait).await;
            }
        }

        Err(LockError::Contended {
            name: name.to_string(),
            attempts,
        })
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        if !self.unlock(handle.name(), handle.token()).await? {
            debug!(lock = handle.name(), "lock already expired or taken over");
        }
        Ok(())
    }
}
