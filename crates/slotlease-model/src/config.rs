use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Pool key used when none is configured.
pub const DEFAULT_POOL_KEY: &str = "fixed-id";

/// TTL of the mutex guarding the pool scan (in milliseconds).
pub const DEFAULT_LOCK_TTL_MS: u64 = 6_000;

/// Period between lease renewals (in milliseconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 3_000;

/// Age after which an un-renewed entry is considered abandoned (30 minutes).
pub const DEFAULT_DEAD_TIME_MS: u64 = 1_800_000;

/// Lease allocator configuration.
///
/// Every option is optional when deserialized; missing fields fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LeaseConfig {
    /// Key of the shared hash holding `slot-id -> last-seen`.
    pub pool_key: String,
    /// TTL of the scan mutex.
    pub lock_ttl_ms: u64,
    /// Heartbeat period, also the verification wait for contested claims.
    pub heartbeat_interval_ms: u64,
    /// Abandonment threshold.
    pub dead_time_ms: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            pool_key: DEFAULT_POOL_KEY.to_string(),
            lock_ttl_ms: DEFAULT_LOCK_TTL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            dead_time_ms: DEFAULT_DEAD_TIME_MS,
        }
    }
}

impl LeaseConfig {
    /// Replace the pool key and return updated config.
    pub fn with_pool_key(mut self, key: impl Into<String>) -> Self {
        self.pool_key = key.into();
        self
    }

    /// Name of the mutex guarding the pool scan.
    pub fn lock_name(&self) -> String {
        format!("{}-lock", self.pool_key)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn dead_time(&self) -> Duration {
        Duration::from_millis(self.dead_time_ms)
    }

    /// `true` when a healthy owner can look abandoned between two of its own heartbeats.
    ///
    /// Allowed, but every scan may then reclaim live entries.
    pub fn dead_time_within_heartbeat(&self) -> bool {
        self.dead_time_ms <= self.heartbeat_interval_ms
    }

    /// Check the config for values the protocol cannot work with.
    pub fn validate(&self) -> ModelResult<()> {
        if self.pool_key.trim().is_empty() {
            return Err(ModelError::Invalid("pool-key must not be empty".into()));
        }
        if self.lock_ttl_ms == 0 {
            return Err(ModelError::Invalid("lock-ttl-ms must be > 0".into()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ModelError::Invalid(
                "heartbeat-interval-ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
