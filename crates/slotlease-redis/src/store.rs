use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::trace;

use slotlease_core::{PoolStore, StoreError};

use crate::error::store_error;

/// [`PoolStore`] over a Redis hash.
#[derive(Clone)]
pub struct RedisPoolStore {
    conn: ConnectionManager,
}

impl RedisPoolStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PoolStore for RedisPoolStore {
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        trace!(key, field, value, "HSET");
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(store_error)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await.map_err(store_error)?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let all: HashMap<String, String> = conn.hgetall(key).await.map_err(store_error)?;
        trace!(key, fields = all.len(), "HGETALL");
        Ok(all)
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        trace!(key, field, "HDEL");
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(key, field)
            .await
            .map_err(store_error)
    }
}
