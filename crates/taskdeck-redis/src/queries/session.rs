//! Session side-store queries: plain string values under `td:session:*`.

use crate::client::{RedisPool, RedisResult};
use redis::AsyncCommands;

fn session_key(key: &str) -> String {
    format!("td:session:{}", key)
}

pub async fn put_value(pool: &RedisPool, key: &str, value: &str) -> RedisResult<()> {
    let mut conn = pool.clone();
    conn.set::<_, _, ()>(session_key(key), value).await?;
    Ok(())
}

pub async fn get_value(pool: &RedisPool, key: &str) -> RedisResult<Option<String>> {
    let mut conn = pool.clone();
    let value: Option<String> = conn.get(session_key(key)).await?;
    Ok(value)
}

pub async fn remove_value(pool: &RedisPool, key: &str) -> RedisResult<()> {
    let mut conn = pool.clone();
    conn.del::<_, ()>(session_key(key)).await?;
    Ok(())
}
