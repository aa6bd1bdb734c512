use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::AppState;

const ROTATION_CHECK_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    Flash,
    Featured,
    Vault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatingDomain {
    pub name: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationState {
    pub last_rotated: DateTime<Utc>,
    pub domains: Vec<RotatingDomain>,
}

impl RotationState {
    pub fn is_due(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        now - self.last_rotated >= interval
    }

    pub fn next_rotation(&self, interval: chrono::Duration) -> DateTime<Utc> {
        self.last_rotated + interval
    }

    pub fn tier_counts(&self) -> HashMap<Tier, usize> {
        let mut counts = HashMap::new();
        for domain in &self.domains {
            *counts.entry(domain.tier).or_insert(0) += 1;
        }
        counts
    }

    /// Deals the domain names back out over the existing tier slots, so each
    /// tier keeps its size while its members change.
    pub fn rotate<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> usize {
        let mut names: Vec<String> = self.domains.iter().map(|d| d.name.clone()).collect();
        names.shuffle(rng);

        let mut moved = 0;
        for (domain, name) in self.domains.iter_mut().zip(names) {
            if domain.name != name {
                moved += 1;
                domain.name = name;
            }
        }
        self.last_rotated = now;
        moved
    }
}

#[derive(Debug)]
pub enum RotationError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl RotationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

impl fmt::Display for RotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => write!(f, "No domain rotation configured"),
            Self::Io(e) => write!(f, "Rotation file error: {}", e),
            Self::Parse(e) => write!(f, "Rotation file is invalid: {}", e),
        }
    }
}

impl std::error::Error for RotationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for RotationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for RotationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

/// JSON file holding the rotation state. The rotation task is its only writer.
#[derive(Debug, Clone)]
pub struct RotationStore {
    path: Arc<PathBuf>,
}

impl RotationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<RotationState, RotationError> {
        let raw = tokio::fs::read_to_string(self.path.as_path()).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes through a temp file and rename so readers never see a partial file.
    pub async fn save(&self, state: &RotationState) -> Result<(), RotationError> {
        let json = serde_json::to_string_pretty(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.path.as_path()).await?;
        Ok(())
    }

    pub async fn rotate_if_due(
        &self,
        now: DateTime<Utc>,
        interval: chrono::Duration,
    ) -> Result<bool, RotationError> {
        let mut state = self.load().await?;
        if !state.is_due(now, interval) {
            debug!("Domain rotation not due until {}", state.next_rotation(interval));
            return Ok(false);
        }

        let moved = state.rotate(&mut OsRng, now);
        self.save(&state).await?;
        info!(moved, total = state.domains.len(), "Rotated domain tiers");
        Ok(true)
    }
}

pub fn spawn_rotation_task(store: RotationStore, interval: chrono::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ROTATION_CHECK_PERIOD);
        loop {
            ticker.tick().await;
            match store.rotate_if_due(Utc::now(), interval).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    debug!("No rotation file at {:?}, skipping", store.path());
                }
                Err(e) => error!("Domain rotation failed: {}", e),
            }
        }
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationStatus {
    pub last_rotated: DateTime<Utc>,
    pub next_rotation: DateTime<Utc>,
    pub domains: Vec<RotatingDomain>,
}

pub async fn get_rotation(State(state): State<AppState>) -> Result<Json<RotationStatus>, Error> {
    let rotation = state.rotation.load().await?;
    Ok(Json(RotationStatus {
        next_rotation: rotation.next_rotation(state.rotation_interval),
        last_rotated: rotation.last_rotated,
        domains: rotation.domains,
    }))
}
