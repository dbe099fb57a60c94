use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ LastMessage, RepeatSuppressor };
use crate::admission::StoreError;

pub struct MemoryRepeatSuppressor {
    last_messages: Mutex<HashMap<String, LastMessage>>,
    refresh_on_repeat: bool,
}

impl MemoryRepeatSuppressor {
    pub fn new(refresh_on_repeat: bool) -> Self {
        Self { last_messages: Mutex::new(HashMap::new()), refresh_on_repeat }
    }
}

#[async_trait]
impl RepeatSuppressor for MemoryRepeatSuppressor {
    async fn is_repeat_at(
        &self,
        key: &str,
        content: &str,
        window: Duration,
        now_ms: i64
    ) -> Result<bool, StoreError> {
        let mut last_messages = self.last_messages.lock().await;
        if let Some(last) = last_messages.get_mut(key) {
            if last.repeats(content, window, now_ms) {
                if self.refresh_on_repeat {
                    last.at = now_ms;
                }
                return Ok(true);
            }
        }
        last_messages.insert(key.to_string(), LastMessage { content: content.to_string(), at: now_ms });
        Ok(false)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
