//! Durable side-stores for the selection cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use taskdeck_redis::session;
use taskdeck_redis::RedisPool;

use crate::error::BoardResult;

/// Best-effort key/value persistence. Callers log and swallow failures.
#[async_trait]
pub trait SideStore: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> BoardResult<()>;

    async fn remove(&self, key: &str) -> BoardResult<()>;

    async fn get(&self, key: &str) -> BoardResult<Option<String>>;
}

/// Process-local side-store.
#[derive(Default)]
pub struct MemorySideStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySideStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl SideStore for MemorySideStore {
    async fn put(&self, key: &str, value: &str) -> BoardResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> BoardResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> BoardResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }
}

/// Side-store kept in Redis under `td:session:*`.
#[derive(Clone)]
pub struct RedisSideStore {
    pool: RedisPool,
}

impl RedisSideStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub async fn connect(redis_url: &str) -> BoardResult<Self> {
        Ok(Self::new(taskdeck_redis::init_pool(redis_url).await?))
    }
}

#[async_trait]
impl SideStore for RedisSideStore {
    async fn put(&self, key: &str, value: &str) -> BoardResult<()> {
        session::put_value(&self.pool, key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> BoardResult<()> {
        session::remove_value(&self.pool, key).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> BoardResult<Option<String>> {
        Ok(session::get_value(&self.pool, key).await?)
    }
}
