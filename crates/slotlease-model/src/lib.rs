mod config;
pub use config::{
    DEFAULT_DEAD_TIME_MS, DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_LOCK_TTL_MS, DEFAULT_POOL_KEY,
    LeaseConfig,
};

mod error;
pub use error::{ModelError, ModelResult};

mod slot;
pub use slot::SlotId;

/// Wall-clock timestamp in milliseconds since the UNIX epoch.
///
/// Stored as the value of every pool entry (`last-seen`).
pub type EpochMs = u64;

/// Parse a raw pool value into a `last-seen` timestamp.
pub fn parse_last_seen(slot: &str, raw: &str) -> ModelResult<EpochMs> {
    raw.trim()
        .parse::<EpochMs>()
        .map_err(|_| ModelError::InvalidTimestamp {
            slot: slot.to_string(),
            raw: raw.to_string(),
        })
}
