//! Command handlers and the config plumbing they share.

pub mod config_cmd;
pub mod run;

use std::path::PathBuf;

use poolbridge_config::{Config, load_config_from};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(poolbridge_config::config_path)
}

/// Load the config and apply global flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    let mut cfg = load_config_from(&path).map_err(|e| CliError::from_config(e, &path))?;
    if let Some(ref address) = global.address {
        cfg.device.address = Some(address.clone());
    }
    Ok(cfg)
}
