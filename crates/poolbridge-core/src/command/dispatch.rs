// ── Command dispatcher ──
//
// Resolves an intent's relay from the store, picks the physical command,
// sends it, and records the relay in the force-update ledger. Identity
// failures are returned to the caller; transport failures are logged and
// reported as an outcome.

use std::sync::Arc;

use poolbridge_api::{DeviceApi, RelayCommand};
use tracing::{debug, info, warn};

use super::Intent;
use crate::error::CoreError;
use crate::model::{DataObject, DosageTarget, RelayEntry, SystemInfo};
use crate::reconcile::ForceUpdateLedger;
use crate::store::{ObjectKind, ObjectStore, paths};

/// The physical command chosen for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Relay(RelayCommand),
    Timer { channel: u32, seconds: u32 },
    Dosage { target: DosageTarget, seconds: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The device accepted the command.
    Sent { id: u32, command: DeviceCommand },
    /// The transport call failed. The command may still have reached the
    /// device, so the relay is force-updated anyway.
    TransportFailed { id: u32, command: DeviceCommand },
    /// Nothing to send (dosage timer on a relay without a dosage channel).
    Skipped { id: u32 },
}

impl DispatchOutcome {
    pub fn id(&self) -> u32 {
        match self {
            Self::Sent { id, .. } | Self::TransportFailed { id, .. } | Self::Skipped { id } => *id,
        }
    }
}

/// A relay resolved from its store channel.
struct Target {
    relay: DataObject,
    /// Current display name of the channel.
    label: String,
}

pub struct Dispatcher {
    device: Arc<dyn DeviceApi>,
    store: Arc<dyn ObjectStore>,
}

impl Dispatcher {
    pub fn new(device: Arc<dyn DeviceApi>, store: Arc<dyn ObjectStore>) -> Self {
        Self { device, store }
    }

    /// Execute one intent. `sys_info` supplies the configured dosage
    /// relays; `ledger` receives the relay id whenever a command was sent.
    pub async fn dispatch(
        &self,
        intent: &Intent,
        sys_info: &SystemInfo,
        ledger: &mut ForceUpdateLedger,
    ) -> Result<DispatchOutcome, CoreError> {
        let Target { relay, label } = self.resolve(intent.channel()).await?;

        let command = match *intent {
            Intent::SetAuto { want: true, .. } => DeviceCommand::Relay(RelayCommand::Auto),
            Intent::SetAuto { want: false, .. } => {
                let on = self.current_on_off(&relay).await?;
                DeviceCommand::Relay(if on { RelayCommand::On } else { RelayCommand::Off })
            }
            Intent::SetOnOff { want, .. } => {
                DeviceCommand::Relay(if want { RelayCommand::On } else { RelayCommand::Off })
            }
            Intent::SetDosageTimer { seconds, .. } => {
                let channel = relay.relay_channel();
                match sys_info.dosage_target(channel) {
                    Some(target) => DeviceCommand::Dosage { target, seconds },
                    None => {
                        info!(
                            label = %label,
                            channel,
                            "relay is not a configured dosage relay, dosage timer ignored"
                        );
                        return Ok(DispatchOutcome::Skipped { id: relay.id });
                    }
                }
            }
            Intent::SetRelayTimer { seconds, .. } => DeviceCommand::Timer {
                channel: relay.timer_channel(),
                seconds,
            },
        };

        let result = match command {
            DeviceCommand::Relay(cmd) => self.device.send_relay(&relay, cmd).await.map(drop),
            DeviceCommand::Timer { channel, seconds } => {
                self.device.set_timer(channel, seconds).await
            }
            DeviceCommand::Dosage { target, seconds } => {
                self.device.set_dosage(target, seconds).await
            }
        };

        ledger.insert(relay.id);

        match result {
            Ok(()) => {
                debug!(label = %label, id = relay.id, ?command, "command sent");
                Ok(DispatchOutcome::Sent {
                    id: relay.id,
                    command,
                })
            }
            Err(e) => {
                warn!(label = %label, id = relay.id, ?command, error = %e, "device command failed");
                Ok(DispatchOutcome::TransportFailed {
                    id: relay.id,
                    command,
                })
            }
        }
    }

    async fn resolve(&self, channel: &str) -> Result<Target, CoreError> {
        let object = self
            .store
            .get_object(channel)
            .await?
            .ok_or_else(|| CoreError::ObjectNotFound {
                path: channel.to_owned(),
            })?;

        if object.kind != ObjectKind::Channel {
            return Err(CoreError::IdentityMissing {
                path: channel.to_owned(),
                reason: "not a channel".into(),
            });
        }

        let relay: DataObject =
            serde_json::from_value(object.native).map_err(|e| CoreError::IdentityMissing {
                path: channel.to_owned(),
                reason: e.to_string(),
            })?;
        if !relay.is_relay() {
            return Err(CoreError::NotARelay {
                path: channel.to_owned(),
            });
        }

        Ok(Target {
            relay,
            label: object.common.name,
        })
    }

    async fn current_on_off(&self, relay: &DataObject) -> Result<bool, CoreError> {
        let path = paths::relay_entry(relay, RelayEntry::OnOff);
        let state = self.store.get_state(&path).await?;
        Ok(state.is_some_and(|s| s.value.as_bool() == Some(true)))
    }
}
