use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SPIN_WINDOW: Duration = Duration::from_secs(60);
pub const API_WINDOW: Duration = Duration::from_secs(60);

pub const SPIN_MAX_REQUESTS: u32 = 30;
pub const API_MAX_REQUESTS: u32 = 1000;

pub const SPIN_RATE_LIMIT_ERROR: &str = "Too many spins. Please slow down and try again in a minute.";
pub const API_RATE_LIMIT_ERROR: &str = "Too many requests, please try again later.";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitType {
    Spin,
    Api,
}

impl RateLimitType {
    pub fn get_window(&self) -> Duration {
        match self {
            Self::Spin => SPIN_WINDOW,
            Self::Api => API_WINDOW,
        }
    }

    pub fn get_max_attempts(&self) -> u32 {
        match self {
            Self::Spin => SPIN_MAX_REQUESTS,
            Self::Api => API_MAX_REQUESTS,
        }
    }

    pub fn get_error_message(&self) -> &'static str {
        match self {
            Self::Spin => SPIN_RATE_LIMIT_ERROR,
            Self::Api => API_RATE_LIMIT_ERROR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitCheck {
    pub current_attempts: u32,
    pub is_locked: bool,
}

impl RateLimitCheck {
    pub fn new(attempts: u32, limit_type: RateLimitType) -> Self {
        Self {
            current_attempts: attempts,
            is_locked: attempts >= limit_type.get_max_attempts(),
        }
    }
}

pub fn get_rate_limit_key(limit_type: RateLimitType, identifier: &str) -> String {
    format!("rate_limit:{}:{}",
        match limit_type {
            RateLimitType::Spin => "spin",
            RateLimitType::Api => "api",
        },
        identifier
    )
}
