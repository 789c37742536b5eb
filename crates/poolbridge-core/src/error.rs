// ── Core error types ──
//
// User-facing errors from poolbridge-core. Consumers never see raw device
// transport failures; the `From<poolbridge_api::Error>` impl translates
// them into domain-appropriate variants.

use thiserror::Error;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach pool controller: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Pool controller timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Engine stopped")]
    Stopped,

    // ── Identity errors ──────────────────────────────────────────────
    #[error("Object not found in store: {path}")]
    ObjectNotFound { path: String },

    #[error("Object {path} has no usable device identity: {reason}")]
    IdentityMissing { path: String, reason: String },

    #[error("Not a relay: {path}")]
    NotARelay { path: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Command rejected by device: {message}")]
    Rejected { message: String },

    #[error("Invalid intent payload for {path}: {reason}")]
    InvalidPayload { path: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from device-layer errors ──────────────────────────────

impl From<poolbridge_api::Error> for CoreError {
    fn from(err: poolbridge_api::Error) -> Self {
        match err {
            poolbridge_api::Error::Transport { message } => {
                CoreError::ConnectionFailed { reason: message }
            }
            poolbridge_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            poolbridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid device address: {e}"),
            },
            poolbridge_api::Error::Rejected { message } => CoreError::Rejected { message },
            poolbridge_api::Error::UnknownRelay { channel } => CoreError::Rejected {
                message: format!("device has no relay channel {channel}"),
            },
            poolbridge_api::Error::Decode(e) => {
                CoreError::Internal(format!("Snapshot decoding failed: {e}"))
            }
            poolbridge_api::Error::Io(e) => CoreError::Internal(format!("IO error: {e}")),
            poolbridge_api::Error::Stopped => CoreError::Stopped,
        }
    }
}
