use async_trait::async_trait;
use log::debug;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use uuid::Uuid;

use super::RateLimiter;
use crate::admission::{ window_ms, window_secs_ceil, StoreError };

/// Limiter backed by one sorted set per client, scored by request time.
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, key_prefix: &str) -> Self {
        Self { conn, key_prefix: key_prefix.to_string() }
    }

    fn window_key(&self, key: &str) -> String {
        format!("{}rl:{}", self.key_prefix, key)
    }
}

/// Add, prune, count and refresh expiry, sent as a single pipeline so the
/// count reflects this call's own pruning.
fn window_pipeline(window_key: &str, now_ms: i64, window: Duration) -> redis::Pipeline {
    let member = format!("{}-{}", now_ms, Uuid::new_v4());
    let mut pipe = redis::pipe();
    pipe.cmd("ZADD").arg(window_key).arg(now_ms).arg(member).ignore()
        .cmd("ZREMRANGEBYSCORE").arg(window_key).arg(0).arg(format!("({}", now_ms - window_ms(window))).ignore()
        .cmd("ZCARD").arg(window_key)
        .cmd("EXPIRE").arg(window_key).arg(window_secs_ceil(window)).ignore();
    pipe
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check_at(
        &self,
        key: &str,
        limit: usize,
        window: Duration,
        now_ms: i64
    ) -> Result<bool, StoreError> {
        let window_key = self.window_key(key);
        let mut conn = self.conn.clone();
        let (count,): (usize,) = window_pipeline(&window_key, now_ms, window)
            .query_async(&mut conn).await?;
        debug!("Rate window {} holds {} requests (limit {})", window_key, count, limit);
        Ok(count <= limit)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
