// ── Runtime engine configuration ──
//
// Describes *which* device the engine talks to and how often. Core never
// reads config files; the CLI builds an `EngineConfig` and hands it in.

use std::time::Duration;

use url::Url;

use crate::error::CoreError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_INTENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Device base URL (e.g., `http://192.168.1.50`).
    pub device_address: Url,
    /// Time between two polls.
    pub poll_interval: Duration,
    /// Capacity of the state-change channel the engine listens on.
    pub intent_buffer: usize,
}

impl EngineConfig {
    /// Validate `address` and build a config with default tuning.
    ///
    /// An address that is not an `http`/`https` URL with a host is a
    /// configuration error; the engine must not start with it.
    pub fn new(address: &str) -> Result<Self, CoreError> {
        Ok(Self {
            device_address: parse_device_address(address)?,
            poll_interval: DEFAULT_POLL_INTERVAL,
            intent_buffer: DEFAULT_INTENT_BUFFER,
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_intent_buffer(mut self, size: usize) -> Self {
        self.intent_buffer = size.max(1);
        self
    }
}

pub fn parse_device_address(address: &str) -> Result<Url, CoreError> {
    let url = Url::parse(address.trim()).map_err(|e| CoreError::Config {
        message: format!("Invalid device address '{address}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoreError::Config {
            message: format!("Invalid device address '{address}': scheme must be http or https"),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::Config {
            message: format!("Invalid device address '{address}': missing host"),
        });
    }
    Ok(url)
}
