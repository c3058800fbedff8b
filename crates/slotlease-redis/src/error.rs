use redis::RedisError;
use thiserror::Error;

use slotlease_core::{LockError, StoreError};

#[derive(Debug, Error)]
pub enum RedisBackendError {
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("invalid redis lock config: {0}")]
    InvalidConfig(String),
}

/// Whether the error means the server could not be reached at all.
fn is_unreachable(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
}

pub(crate) fn store_error(e: RedisError) -> StoreError {
    if is_unreachable(&e) {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

pub(crate) fn lock_error(e: RedisError) -> LockError {
    if is_unreachable(&e) {
        LockError::Unavailable(e.to_string())
    } else {
        LockError::Backend(e.to_string())
    }
}
