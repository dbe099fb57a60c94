mod memory;
mod redis;

pub use self::memory::MemoryRateLimiter;
pub use self::redis::RedisRateLimiter;

use async_trait::async_trait;
use std::time::Duration;

use super::{ now_ms, StoreError };

/// Sliding-window request counter keyed by client.
///
/// A call records the request and reports whether the number of requests from
/// `key` inside the trailing `window`, the current one included, is at most
/// `limit`. Rejected requests stay in the window.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_at(
        &self,
        key: &str,
        limit: usize,
        window: Duration,
        now_ms: i64
    ) -> Result<bool, StoreError>;

    async fn check(&self, key: &str, limit: usize, window: Duration) -> Result<bool, StoreError> {
        self.check_at(key, limit, window, now_ms()).await
    }

    fn backend(&self) -> &'static str;
}
