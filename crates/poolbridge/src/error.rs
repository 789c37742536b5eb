//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poolbridge_config::ConfigError;
use poolbridge_core::{CoreError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(poolbridge::config),
        help(
            "Fix the value in {path}\n\
             or override it with POOLBRIDGE_<SECTION>__<KEY>."
        )
    )]
    InvalidConfig {
        field: String,
        reason: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(poolbridge::config_load))]
    Config(#[from] ConfigError),

    #[error("No device fixture configured")]
    #[diagnostic(
        code(poolbridge::no_fixture),
        help("Set device.fixture in {path} or pass --fixture <FILE>.")
    )]
    NoFixture { path: String },

    #[error("Could not load device fixture {path}")]
    #[diagnostic(
        code(poolbridge::fixture),
        help("The fixture must be a JSON snapshot with `sysInfo` and `objects`.")
    )]
    Fixture {
        path: String,
        #[source]
        source: poolbridge_api::Error,
    },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the pool controller: {reason}")]
    #[diagnostic(code(poolbridge::connection_failed))]
    ConnectionFailed { reason: String },

    // ── Usage ────────────────────────────────────────────────────────
    #[error("No store object at {path}")]
    #[diagnostic(
        code(poolbridge::unknown_path),
        help("Run with --dump to list the available paths.")
    )]
    UnknownPath { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poolbridge::validation))]
    Validation { field: String, reason: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(poolbridge::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig { .. }
            | Self::Config(_)
            | Self::NoFixture { .. }
            | Self::Fixture { .. } => exit_code::CONFIG,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::UnknownPath { .. } | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the config file path to validation failures.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::InvalidConfig {
                field,
                reason,
                path: path.display().to_string(),
            },
            other => Self::Config(other),
        }
    }
}

// ── StoreError → CliError mapping ────────────────────────────────────

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { path } => CliError::UnknownPath { path },
            StoreError::Rejected { path, reason } => CliError::Validation {
                field: path,
                reason,
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::Timeout { timeout_secs } => CliError::ConnectionFailed {
                reason: format!("timed out after {timeout_secs}s"),
            },
            CoreError::ObjectNotFound { path } => CliError::UnknownPath { path },
            CoreError::IdentityMissing { path, reason } => CliError::Validation {
                field: path,
                reason,
            },
            CoreError::NotARelay { path } => CliError::Validation {
                field: path,
                reason: "not a relay".into(),
            },
            CoreError::InvalidPayload { path, reason } => CliError::Validation {
                field: path,
                reason,
            },
            CoreError::Store(e) => e.into(),
            CoreError::Config { message } => CliError::InvalidConfig {
                field: "device.address".into(),
                reason: message,
                path: String::new(),
            },
            CoreError::Rejected { message } | CoreError::Internal(message) => {
                CliError::Internal(message)
            }
            CoreError::Stopped => CliError::Internal("engine stopped".into()),
        }
    }
}
