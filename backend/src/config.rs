use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use shared::prize::{PrizeConfigError, PrizeTable};
use tracing::info;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://127.0.0.1:8080,http://127.0.0.1:3000";
const DEFAULT_ROTATION_FILE: &str = "data/rotation.json";
const DEFAULT_ROTATION_INTERVAL_HOURS: i64 = 24;

#[derive(Debug)]
pub enum ConfigError {
    InvalidBindAddr(String),
    InvalidRotationInterval(String),
    PrizeFile { path: PathBuf, source: std::io::Error },
    Prizes(PrizeConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBindAddr(value) => write!(f, "BIND_ADDR is not a socket address: {}", value),
            Self::InvalidRotationInterval(value) => {
                write!(f, "ROTATION_INTERVAL_HOURS must be a positive integer: {}", value)
            }
            Self::PrizeFile { path, source } => {
                write!(f, "Failed to read prize configuration {:?}: {}", path, source)
            }
            Self::Prizes(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PrizeFile { source, .. } => Some(source),
            Self::Prizes(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PrizeConfigError> for ConfigError {
    fn from(err: PrizeConfigError) -> Self {
        Self::Prizes(err)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub prize_config_path: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub receipt_secret: String,
    pub allowed_origins: Vec<String>,
    pub rotation_file: PathBuf,
    pub rotation_interval: chrono::Duration,
}

impl Config {
    /// Reads the environment. Call after `dotenvy` has loaded `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_addr.clone()))?;

        let interval_hours = match env::var("ROTATION_INTERVAL_HOURS") {
            Ok(value) => value
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::InvalidRotationInterval(value))?,
            Err(_) => DEFAULT_ROTATION_INTERVAL_HOURS,
        };

        Ok(Self {
            bind_addr,
            prize_config_path: non_empty_var("PRIZE_CONFIG_PATH").map(PathBuf::from),
            redis_url: non_empty_var("REDIS_URL"),
            receipt_secret: env::var("SPIN_RECEIPT_SECRET")
                .unwrap_or_else(|_| "default_spin_receipt_secret".to_string()),
            allowed_origins: parse_origins(
                &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
            rotation_file: PathBuf::from(
                env::var("ROTATION_FILE").unwrap_or_else(|_| DEFAULT_ROTATION_FILE.to_string()),
            ),
            rotation_interval: chrono::Duration::hours(interval_hours),
        })
    }

    /// Loads the prize table once at startup, falling back to the built-in table.
    pub fn load_prizes(&self) -> Result<PrizeTable, ConfigError> {
        match &self.prize_config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PrizeFile {
                    path: path.clone(),
                    source,
                })?;
                let table = PrizeTable::from_json(&raw)?;
                info!("Loaded {} prizes from {:?}", table.prizes().len(), path);
                Ok(table)
            }
            None => {
                info!("PRIZE_CONFIG_PATH not set, using built-in prize table");
                Ok(PrizeTable::default())
            }
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
