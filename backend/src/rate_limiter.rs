use std::future::Future;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use redis::{Client as RedisClient, RedisError};
use serde_json::json;
use shared::rate_limit::{get_rate_limit_key, RateLimitCheck, RateLimitType};
use tracing::warn;

pub struct RateLimitError(pub RateLimitType);

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": self.0.get_error_message() })),
        )
            .into_response()
    }
}

/// Fixed window hit counter.
pub trait HitCounter {
    /// Counts one hit on `key` and returns the hits so far in the current window.
    fn hit(&self, key: &str, window: Duration) -> impl Future<Output = Result<u32, RedisError>> + Send;
}

pub struct RedisCounter<'a>(pub &'a RedisClient);

impl HitCounter for RedisCounter<'_> {
    async fn hit(&self, key: &str, window: Duration) -> Result<u32, RedisError> {
        let mut conn = self.0.get_async_connection().await?;
        // SET NX EX opens the window with its TTL; INCR keeps it. Both run in
        // one MULTI/EXEC so a key never exists without an expiry.
        let (attempts,): (u32,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(window.as_secs())
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(attempts)
    }
}

/// Lets the request through when the counter is unreachable.
pub async fn check_rate_limit<C: HitCounter>(
    counter: &C,
    limit_type: RateLimitType,
    ip: &str,
) -> Result<(), RateLimitError> {
    let key = get_rate_limit_key(limit_type, ip);
    let attempts = match counter.hit(&key, limit_type.get_window()).await {
        Ok(attempts) => attempts,
        Err(e) => {
            warn!(key = %key, "Rate limiter unavailable, allowing request: {}", e);
            return Ok(());
        }
    };

    if RateLimitCheck::new(attempts.saturating_sub(1), limit_type).is_locked {
        warn!(ip = %ip, attempts, "Rate limit hit on {}", key);
        return Err(RateLimitError(limit_type));
    }
    Ok(())
}

/// No redis configured means no rate limiting.
pub async fn enforce(
    redis: Option<&RedisClient>,
    limit_type: RateLimitType,
    ip: &str,
) -> Result<(), RateLimitError> {
    match redis {
        Some(client) => check_rate_limit(&RedisCounter(client), limit_type, ip).await,
        None => Ok(()),
    }
}
