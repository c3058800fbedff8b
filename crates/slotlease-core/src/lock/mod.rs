//! Distributed mutual-exclusion abstraction.
//!
//! A [`LockService`] grants TTL-bounded, token-identified locks. The allocator never calls
//! it directly: it goes through [`LockGuard`], which releases the lock on every exit path.
mod guard;
pub use guard::LockGuard;

mod memory;
pub use memory::MemoryLockService;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockError;

/// Proof of a granted lock.
///
/// The token is unique per acquisition, so a holder whose TTL lapsed cannot release
/// a lock that was since granted to someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    name: String,
    token: String,
}

impl LockHandle {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[async_trait]
pub trait LockService: Send + Sync + 'static {
    /// Acquire `name` for at most `ttl`, waiting while another holder has it.
    ///
    /// Implementations give up with [`LockError::Contended`] after their own retry budget.
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<LockHandle, LockError>;

    /// Release a previously acquired lock.
    ///
    /// Releasing a lock whose TTL already lapsed is a no-op.
    async fn release(&self, handle: &LockHandle) -> Result<(), LockError>;
}
