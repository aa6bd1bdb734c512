use std::fmt;

use redis::Client as RedisClient;
use serde::Serialize;
use serde_json::Number;
use shared::prize::Prize;
use tracing::{debug, error};
use uuid::Uuid;

const HISTORY_LENGTH: isize = 50;

/// One resolved spin as handed to the recorder hook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinRecord {
    pub id: Uuid,
    pub wallet: String,
    pub prize: Prize,
    pub claimed_tickets: Number,
    pub new_balance: Number,
    pub timestamp: String,
}

#[derive(Debug)]
pub enum RecorderError {
    Redis(redis::RedisError),
    Encode(serde_json::Error),
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis(e) => write!(f, "Redis error: {}", e),
            Self::Encode(e) => write!(f, "Encoding error: {}", e),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<redis::RedisError> for RecorderError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err)
    }
}

impl From<serde_json::Error> for RecorderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err)
    }
}

/// Where resolved spins go. Nothing here feeds back into the spin response:
/// the claimed balance stays the only balance the endpoint knows about.
#[derive(Clone)]
pub enum SpinRecorder {
    Log,
    Redis(RedisClient),
}

impl SpinRecorder {
    pub async fn record(&self, record: &SpinRecord) {
        match self {
            Self::Log => debug!("Spin {} for {} recorded in log only", record.id, record.wallet),
            Self::Redis(client) => {
                if let Err(e) = push_history(client, record).await {
                    error!("Failed to record spin {} for {}: {}", record.id, record.wallet, e);
                }
            }
        }
    }
}

pub fn history_key(wallet: &str) -> String {
    format!("spin_history:{}", wallet)
}

async fn push_history(client: &RedisClient, record: &SpinRecord) -> Result<(), RecorderError> {
    let payload = serde_json::to_string(record)?;
    let key = history_key(&record.wallet);
    let mut conn = client.get_async_connection().await?;

    let _: () = redis::cmd("LPUSH")
        .arg(&key)
        .arg(payload)
        .query_async(&mut conn)
        .await?;
    let _: () = redis::cmd("LTRIM")
        .arg(&key)
        .arg(0)
        .arg(HISTORY_LENGTH - 1)
        .query_async(&mut conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SpinRecord {
        SpinRecord {
            id: Uuid::new_v4(),
            wallet: "abc".to_string(),
            prize: Prize::new("Jackpot", "legendary", 3.0, 5),
            claimed_tickets: Number::from(5),
            new_balance: Number::from(0),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let value = serde_json::to_value(record()).unwrap();
        assert_eq!(value["claimedTickets"], serde_json::json!(5));
        assert_eq!(value["newBalance"], serde_json::json!(0));
        assert_eq!(value["prize"]["tickets"], serde_json::json!(5));
    }

    #[test]
    fn test_history_key_is_per_wallet() {
        assert_eq!(history_key("abc"), "spin_history:abc");
    }

    #[tokio::test]
    async fn test_unreachable_redis_does_not_fail_record() {
        let client = RedisClient::open("redis://127.0.0.1:1/").unwrap();
        SpinRecorder::Redis(client).record(&record()).await;
        SpinRecorder::Log.record(&record()).await;
    }
}
