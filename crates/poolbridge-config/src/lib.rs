//! Configuration for the pool controller bridge.
//!
//! TOML file plus `POOLBRIDGE_*` environment overrides, validation, and
//! translation to `poolbridge_core::EngineConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use poolbridge_core::{CoreError, EngineConfig};

pub const ENV_PREFIX: &str = "POOLBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Device base URL (e.g., "http://192.168.1.50").
    pub address: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// JSON snapshot served by the simulated device.
    pub fixture: Option<PathBuf>,

    /// Polls before a simulated command shows up in snapshots.
    #[serde(default = "default_confirmation_lag")]
    pub confirmation_lag: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            address: None,
            poll_interval_secs: default_poll_interval(),
            fixture: None,
            confirmation_lag: default_confirmation_lag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_intent_buffer")]
    pub intent_buffer: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            intent_buffer: default_intent_buffer(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}
fn default_confirmation_lag() -> u32 {
    1
}
fn default_intent_buffer() -> usize {
    64
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "poolbridge", "poolbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poolbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then the file at `path` (if present), then the
/// environment (`POOLBRIDGE_DEVICE__ADDRESS`, ...).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load from the canonical config path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

impl Config {
    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every setting without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_engine_config().map(drop)
    }

    /// Build the engine configuration. A missing or malformed device
    /// address is a validation error.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let address = self
            .device
            .address
            .as_deref()
            .ok_or_else(|| ConfigError::Validation {
                field: "device.address".into(),
                reason: "not set".into(),
            })?;

        let config = EngineConfig::new(address).map_err(|e| match e {
            CoreError::Config { message } => ConfigError::Validation {
                field: "device.address".into(),
                reason: message,
            },
            other => ConfigError::Validation {
                field: "device.address".into(),
                reason: other.to_string(),
            },
        })?;

        if self.device.poll_interval_secs == 0 {
            return Err(ConfigError::Validation {
                field: "device.poll_interval_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.engine.intent_buffer == 0 {
            return Err(ConfigError::Validation {
                field: "engine.intent_buffer".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(config
            .with_poll_interval(Duration::from_secs(self.device.poll_interval_secs))
            .with_intent_buffer(self.engine.intent_buffer))
    }
}
