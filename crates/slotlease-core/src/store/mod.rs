//! Shared store abstraction.
//!
//! The allocator only ever needs single-field operations on one hash: set, get,
//! get-all and delete. Backends implement [`PoolStore`]; values are the decimal
//! `last-seen` timestamps, kept as strings the way a key-value store holds them.
mod memory;
pub use memory::MemoryPoolStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;

#[async_trait]
pub trait PoolStore: Send + Sync + 'static {
    /// Upsert a single field.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Read a single field; `None` when absent.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Read the whole hash; empty when the key does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Delete a single field. Deleting an absent field is not an error.
    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError>;
}
