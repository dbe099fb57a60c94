pub mod rate_limit;
pub mod repeat;
pub mod store;
pub mod validation;

use axum::http::HeaderMap;
use chrono::Utc;
use log::{ info, warn };
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;
use self::rate_limit::{ MemoryRateLimiter, RateLimiter, RedisRateLimiter };
use self::repeat::{ MemoryRepeatSuppressor, RedisRepeatSuppressor, RepeatSuppressor };

pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("shared store error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("shared store record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Per-client admission thresholds.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub rate_limit: usize,
    pub rate_window: Duration,
    pub repeat_window: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            rate_limit: 20,
            rate_window: Duration::from_secs(5 * 60),
            repeat_window: Duration::from_secs(20),
        }
    }
}

impl AdmissionPolicy {
    pub fn from_args(args: &Args) -> Self {
        Self {
            rate_limit: args.rate_limit_count,
            rate_window: Duration::from_secs(args.rate_limit_window_secs),
            repeat_window: Duration::from_secs(args.repeat_window_secs),
        }
    }

    /// Value of the `Retry-After` header sent with a rate-limit rejection.
    pub fn retry_after_secs(&self) -> u64 {
        self.rate_window.as_secs().max(1)
    }
}

/// Rate limiter and repeat suppressor sharing one backend.
#[derive(Clone)]
pub struct AdmissionGuards {
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub repeat_suppressor: Arc<dyn RepeatSuppressor>,
}

impl AdmissionGuards {
    pub fn in_memory(refresh_on_repeat: bool) -> Self {
        Self {
            rate_limiter: Arc::new(MemoryRateLimiter::new()),
            repeat_suppressor: Arc::new(MemoryRepeatSuppressor::new(refresh_on_repeat)),
        }
    }

    fn logged(self) -> Self {
        info!(
            "Admission backends: rate_limiter={} repeat_suppressor={}",
            self.rate_limiter.backend(),
            self.repeat_suppressor.backend()
        );
        self
    }
}

/// Picks the shared Redis backend when a store is configured and reachable,
/// in-process memory otherwise.
pub async fn initialize_guards(args: &Args) -> AdmissionGuards {
    let Some(store_url) = args.store_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        info!("No shared store configured (single instance only).");
        return AdmissionGuards::in_memory(args.repeat_refresh_on_hit).logged();
    };

    match store::connect(store_url, args.store_token.as_deref()).await {
        Ok(conn) => {
            AdmissionGuards {
                rate_limiter: Arc::new(RedisRateLimiter::new(conn.clone(), &args.store_prefix)),
                repeat_suppressor: Arc::new(
                    RedisRepeatSuppressor::new(conn, &args.store_prefix, args.repeat_refresh_on_hit)
                ),
            }.logged()
        }
        Err(e) => {
            warn!("Shared store unreachable ({}). Falling back to in-process memory.", e);
            AdmissionGuards::in_memory(args.repeat_refresh_on_hit).logged()
        }
    }
}

/// Client identifier: first `X-Forwarded-For` entry, then `X-Real-IP`.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().unwrap_or("").trim();
        return if first.is_empty() { UNKNOWN_CLIENT.to_string() } else { first.to_string() };
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// Whole seconds covering `window`, used for store key expiry.
pub(crate) fn window_secs_ceil(window: Duration) -> u64 {
    let secs = window.as_secs();
    if window.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
}
