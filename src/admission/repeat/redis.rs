use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use super::{ LastMessage, RepeatSuppressor };
use crate::admission::{ window_secs_ceil, StoreError };

/// Keeps the last message per client as a JSON record that expires with the window.
pub struct RedisRepeatSuppressor {
    conn: MultiplexedConnection,
    key_prefix: String,
    refresh_on_repeat: bool,
}

impl RedisRepeatSuppressor {
    pub fn new(conn: MultiplexedConnection, key_prefix: &str, refresh_on_repeat: bool) -> Self {
        Self { conn, key_prefix: key_prefix.to_string(), refresh_on_repeat }
    }

    fn record_key(&self, key: &str) -> String {
        format!("{}rp:{}", self.key_prefix, key)
    }
}

/// Outcome of one check against the stored record: whether it is a repeat,
/// and the JSON to write back, if any.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RecordUpdate {
    pub repeat: bool,
    pub write: Option<String>,
}

pub(crate) fn next_record(
    stored: Option<&str>,
    content: &str,
    window: Duration,
    now_ms: i64,
    refresh_on_repeat: bool
) -> Result<RecordUpdate, StoreError> {
    let last = stored.map(|json| serde_json::from_str::<LastMessage>(json)).transpose()?;
    match last {
        Some(last) if last.repeats(content, window, now_ms) => {
            let write = if refresh_on_repeat {
                Some(serde_json::to_string(&LastMessage { at: now_ms, ..last })?)
            } else {
                None
            };
            Ok(RecordUpdate { repeat: true, write })
        }
        _ => {
            let record = LastMessage { content: content.to_string(), at: now_ms };
            Ok(RecordUpdate { repeat: false, write: Some(serde_json::to_string(&record)?) })
        }
    }
}

#[async_trait]
impl RepeatSuppressor for RedisRepeatSuppressor {
    async fn is_repeat_at(
        &self,
        key: &str,
        content: &str,
        window: Duration,
        now_ms: i64
    ) -> Result<bool, StoreError> {
        let record_key = self.record_key(key);
        let mut conn = self.conn.clone();

        let stored: Option<String> = conn.get(&record_key).await?;
        let update = next_record(stored.as_deref(), content, window, now_ms, self.refresh_on_repeat)?;
        if let Some(json) = update.write {
            conn.set_ex::<_, _, ()>(&record_key, json, window_secs_ceil(window)).await?;
        }
        Ok(update.repeat)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_769_904_000_000;
    const WINDOW: Duration = Duration::from_secs(20);

    fn stored(content: &str, at: i64) -> String {
        serde_json::to_string(&LastMessage { content: content.into(), at }).unwrap()
    }

    fn decode(json: &str) -> LastMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn first_message_is_recorded() {
        let update = next_record(None, "hola", WINDOW, T0, false).unwrap();
        assert!(!update.repeat);
        assert_eq!(decode(&update.write.unwrap()), LastMessage { content: "hola".into(), at: T0 });
    }

    #[test]
    fn repeat_leaves_record_alone_by_default() {
        let record = stored("hola", T0);
        let update = next_record(Some(&record), "hola", WINDOW, T0 + 5_000, false).unwrap();
        assert_eq!(update, RecordUpdate { repeat: true, write: None });
    }

    #[test]
    fn repeat_refreshes_timestamp_when_enabled() {
        let record = stored("hola", T0);
        let update = next_record(Some(&record), "hola", WINDOW, T0 + 5_000, true).unwrap();
        assert!(update.repeat);
        assert_eq!(decode(&update.write.unwrap()).at, T0 + 5_000);
    }

    #[test]
    fn expired_or_different_message_overwrites() {
        let record = stored("hola", T0);
        let expired = next_record(Some(&record), "hola", WINDOW, T0 + 20_001, false).unwrap();
        assert!(!expired.repeat);
        assert_eq!(decode(&expired.write.unwrap()).at, T0 + 20_001);

        let other = next_record(Some(&record), "precios", WINDOW, T0 + 1, false).unwrap();
        assert!(!other.repeat);
        assert_eq!(decode(&other.write.unwrap()).content, "precios");
    }

    #[test]
    fn corrupt_record_is_a_store_error() {
        let err = next_record(Some("not json"), "hola", WINDOW, T0, false).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
