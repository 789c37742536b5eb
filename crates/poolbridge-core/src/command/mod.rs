// ── Write intents ──
//
// Platform-originated writes arrive as unacknowledged state changes on a
// relay control entry. The suffix of the path selects the intent; the
// remaining path is the relay's channel.

mod dispatch;

pub use dispatch::{DeviceCommand, DispatchOutcome, Dispatcher};

use crate::error::CoreError;
use crate::model::{RelayEntry, ScalarValue};
use crate::store::{StateChange, paths};

/// A platform write to a relay control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// `.auto`: enter (`true`) or leave (`false`) automatic mode.
    SetAuto { channel: String, want: bool },
    /// `.onOff`: switch manually.
    SetOnOff { channel: String, want: bool },
    /// `.dosageTimer`: run the relay's dosage channel for `seconds`.
    SetDosageTimer { channel: String, seconds: u32 },
    /// `.timer`: arm the relay's generic timer.
    SetRelayTimer { channel: String, seconds: u32 },
}

impl Intent {
    /// Interpret a state change. Acknowledged changes and paths that are
    /// not relay control entries yield `None`.
    pub fn from_change(change: &StateChange) -> Result<Option<Self>, CoreError> {
        if change.ack {
            return Ok(None);
        }
        Self::parse(&change.path, &change.value)
    }

    pub fn parse(path: &str, value: &ScalarValue) -> Result<Option<Self>, CoreError> {
        let Some((channel, entry)) = paths::split_entry(path) else {
            return Ok(None);
        };
        let channel = channel.to_owned();

        let intent = match entry {
            e if e == RelayEntry::Auto.as_ref() => Self::SetAuto {
                channel,
                want: boolean(path, value)?,
            },
            e if e == RelayEntry::OnOff.as_ref() => Self::SetOnOff {
                channel,
                want: boolean(path, value)?,
            },
            e if e == RelayEntry::DosageTimer.as_ref() => Self::SetDosageTimer {
                channel,
                seconds: seconds(path, value)?,
            },
            e if e == RelayEntry::Timer.as_ref() => Self::SetRelayTimer {
                channel,
                seconds: seconds(path, value)?,
            },
            _ => return Ok(None),
        };
        Ok(Some(intent))
    }

    /// Store channel of the targeted relay.
    pub fn channel(&self) -> &str {
        match self {
            Self::SetAuto { channel, .. }
            | Self::SetOnOff { channel, .. }
            | Self::SetDosageTimer { channel, .. }
            | Self::SetRelayTimer { channel, .. } => channel,
        }
    }

    pub fn entry(&self) -> RelayEntry {
        match self {
            Self::SetAuto { .. } => RelayEntry::Auto,
            Self::SetOnOff { .. } => RelayEntry::OnOff,
            Self::SetDosageTimer { .. } => RelayEntry::DosageTimer,
            Self::SetRelayTimer { .. } => RelayEntry::Timer,
        }
    }
}

fn boolean(path: &str, value: &ScalarValue) -> Result<bool, CoreError> {
    value.as_bool().ok_or_else(|| CoreError::InvalidPayload {
        path: path.to_owned(),
        reason: format!("expected a boolean, got {value}"),
    })
}

fn seconds(path: &str, value: &ScalarValue) -> Result<u32, CoreError> {
    value.as_u32().ok_or_else(|| CoreError::InvalidPayload {
        path: path.to_owned(),
        reason: format!("expected a non-negative number of seconds, got {value}"),
    })
}
