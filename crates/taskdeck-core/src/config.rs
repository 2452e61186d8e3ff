//! Taskdeck configuration.
//!
//! Read from `.taskdeck/config.toml` under the working directory when the
//! file exists, then overridden by environment variables:
//!
//! - `TASKDECK_BACKEND` (`redis` or `http`)
//! - `TASKDECK_API_URL`
//! - `REDIS_URL`
//! - `TASKDECK_TIMEOUT_MS`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BoardError, BoardResult};

/// Default REST backend URL.
const DEFAULT_API_URL: &str = "http://127.0.0.1:3030/api";

/// Relative location of the config file.
pub const CONFIG_FILE: &str = ".taskdeck/config.toml";

/// Which remote source of truth the board talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Redis,
    Http,
}

impl Backend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "http" => Some(Self::Http),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskdeckConfig {
    pub backend: Backend,
    pub api_url: String,
    pub redis_url: String,
    /// Upper bound on a single gateway command before it counts as a failure.
    pub mutation_timeout_ms: u64,
    /// Capacity of the per-board event broadcast channel.
    pub event_capacity: usize,
    /// Route segment that marks the company detail section.
    pub section_marker: String,
}

impl Default for TaskdeckConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Redis,
            api_url: DEFAULT_API_URL.to_string(),
            redis_url: taskdeck_redis::client::DEFAULT_REDIS_URL.to_string(),
            mutation_timeout_ms: 10_000,
            event_capacity: 100,
            section_marker: "company_detail".to_string(),
        }
    }
}

impl TaskdeckConfig {
    /// Load the config for a working directory, applying env overrides.
    pub fn load(dir: &Path) -> BoardResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            Self::from_toml(&raw)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        debug!(path = %path.display(), backend = ?config.backend, "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> BoardResult<Self> {
        toml::from_str(raw).map_err(|e| BoardError::Config(e.to_string()))
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> BoardResult<()> {
        if let Some(backend) = lookup("TASKDECK_BACKEND") {
            self.backend = Backend::from_str(&backend).ok_or_else(|| {
                BoardError::Config(format!("Unknown backend '{}'. Use 'redis' or 'http'.", backend))
            })?;
        }
        if let Some(url) = lookup("TASKDECK_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.redis_url = url;
        }
        if let Some(ms) = lookup("TASKDECK_TIMEOUT_MS") {
            self.mutation_timeout_ms = ms
                .parse()
                .map_err(|_| BoardError::Config(format!("Invalid TASKDECK_TIMEOUT_MS '{}'", ms)))?;
        }
        Ok(())
    }

    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }
}
