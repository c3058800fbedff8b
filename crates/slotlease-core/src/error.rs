use thiserror::Error;

use slotlease_model::{ModelError, SlotId};

/// Failure reported by a [`crate::PoolStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure reported by a [`crate::LockService`] backend.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock '{name}' not acquired after {attempts} attempts")]
    Contended { name: String, attempts: u32 },

    #[error("lock service unavailable: {0}")]
    Unavailable(String),

    #[error("lock backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("allocator already owns slot {0}")]
    AlreadyOwned(SlotId),

    #[error("heartbeat task aborted: {0}")]
    HeartbeatAborted(String),
}
