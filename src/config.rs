//! Tuning constants for the scheduling engine and settings for the HTTP server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENGINE_FILE: &str = "engine.json";

/// Weighting constants used by the scheduling engine.
///
/// Every field has a default; an `engine.json` in the data directory may
/// override any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base review intervals in days, indexed by review count.
    pub intervals: Vec<u32>,
    pub learning_after: u32,
    pub reviewing_after: u32,
    pub mastered_after: u32,
    /// Exams further out than this contribute no urgency.
    pub urgency_horizon_days: f64,
    pub urgency_weight: f64,
    pub exam_urgent_threshold: f64,
    pub newness_boost: f64,
    pub hard_focus_multiplier: f64,
    pub target_slot_count: usize,
    pub min_slot_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            intervals: vec![1, 3, 7, 14, 30],
            learning_after: 1,
            reviewing_after: 3,
            mastered_after: 6,
            urgency_horizon_days: 30.0,
            urgency_weight: 2.0,
            exam_urgent_threshold: 0.66,
            newness_boost: 0.5,
            hard_focus_multiplier: 1.5,
            target_slot_count: 4,
            min_slot_minutes: 10,
        }
    }
}

impl EngineConfig {
    /// Load `engine.json` from `dir`, or the defaults when the file is absent.
    pub fn load(dir: &Path) -> Result<EngineConfig, ConfigError> {
        let path = dir.join(ENGINE_FILE);
        if !path.exists() {
            return Ok(EngineConfig::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        tracing::info!(dir = %dir.display(), "loaded engine overrides");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intervals.is_empty() {
            return Err(ConfigError::Invalid("intervals must not be empty".into()));
        }
        if self.intervals.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::Invalid(
                "intervals must be non-decreasing".into(),
            ));
        }
        if !(self.learning_after <= self.reviewing_after
            && self.reviewing_after <= self.mastered_after)
        {
            return Err(ConfigError::Invalid(
                "status thresholds must be ordered learning <= reviewing <= mastered".into(),
            ));
        }
        if !(self.urgency_horizon_days > 0.0) {
            return Err(ConfigError::Invalid(
                "urgency_horizon_days must be positive".into(),
            ));
        }
        if self.target_slot_count == 0 || self.min_slot_minutes == 0 {
            return Err(ConfigError::Invalid(
                "target_slot_count and min_slot_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ServerConfig, ConfigError> {
        let host = lookup("STUDY_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("STUDY_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Env {
                var: "STUDY_PORT",
                value: raw,
            })?,
            None => 3000,
        };
        let data_dir = lookup("STUDY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        Ok(ServerConfig {
            host,
            port,
            data_dir,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Env {
            var: "STUDY_HOST",
            value: raw,
        })
    }
}
