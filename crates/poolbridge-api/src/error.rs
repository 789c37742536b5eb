use thiserror::Error;

/// Top-level error type for the `poolbridge-api` crate.
///
/// Covers every failure mode of the device access layer: polling,
/// relay/timer writes, dosage commands, and poller lifecycle.
/// `poolbridge-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The device could not be reached or the exchange broke off.
    #[error("Device transport error: {message}")]
    Transport { message: String },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Device address could not be parsed.
    #[error("Invalid device address: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Commands ────────────────────────────────────────────────────
    /// The device answered but refused the command.
    #[error("Device rejected command: {message}")]
    Rejected { message: String },

    /// A relay command addressed a channel the device does not have.
    #[error("Unknown relay channel {channel}")]
    UnknownRelay { channel: u32 },

    // ── Data ────────────────────────────────────────────────────────
    /// Snapshot fixture could not be decoded.
    #[error("Snapshot decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// Snapshot fixture could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The poller was stopped; no further snapshots will be delivered.
    #[error("Poller stopped")]
    Stopped,
}

impl Error {
    /// Returns `true` if this is a transient error the poll loop will
    /// recover from on its own schedule.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
