use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use super::RateLimiter;
use crate::admission::{ window_ms, StoreError };

/// Process-local limiter. Not shared between instances, and keys are never
/// evicted.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, Vec<i64>>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check_at(
        &self,
        key: &str,
        limit: usize,
        window: Duration,
        now_ms: i64
    ) -> Result<bool, StoreError> {
        let window = window_ms(window);
        let mut windows = self.windows.lock().await;
        let timestamps = windows.entry(key.to_string()).or_default();
        timestamps.retain(|ts| now_ms - ts <= window);
        timestamps.push(now_ms);
        Ok(timestamps.len() <= limit)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
