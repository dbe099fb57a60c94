mod memory;
mod redis;

pub use self::memory::MemoryRepeatSuppressor;
pub use self::redis::RedisRepeatSuppressor;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ now_ms, window_ms, StoreError };

/// Remembers the last message each client sent and flags an identical
/// resubmission inside `window`.
///
/// A repeat hit leaves the stored timestamp alone unless the suppressor was
/// built with `refresh_on_repeat`, in which case every hit restarts the window.
#[async_trait]
pub trait RepeatSuppressor: Send + Sync {
    async fn is_repeat_at(
        &self,
        key: &str,
        content: &str,
        window: Duration,
        now_ms: i64
    ) -> Result<bool, StoreError>;

    async fn is_repeat(&self, key: &str, content: &str, window: Duration) -> Result<bool, StoreError> {
        self.is_repeat_at(key, content, window, now_ms()).await
    }

    fn backend(&self) -> &'static str;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LastMessage {
    pub content: String,
    pub at: i64,
}

impl LastMessage {
    pub fn repeats(&self, content: &str, window: Duration, now_ms: i64) -> bool {
        self.content == content && now_ms - self.at <= window_ms(window)
    }
}
