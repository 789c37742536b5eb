// ── In-process device ──
//
// A `DeviceApi` implementation that serves snapshots from memory. Relay
// commands mutate the served state after a configurable number of polls,
// reproducing the device's asynchronous confirmation lag. Used by the CLI's
// fixture-driven mode and throughout the test suites.

use std::collections::VecDeque;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::device::{DeviceApi, RelayCommand};
use crate::error::Error;
use crate::model::{DataObject, DosageTarget, RelayState, Snapshot};

/// A write the device received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Relay { channel: u32, command: RelayCommand },
    Timer { channel: u32, seconds: u32 },
    Dosage { target: DosageTarget, seconds: u32 },
}

/// How the next writes should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFailure {
    #[default]
    None,
    /// The device refuses the command; nothing changes.
    Reject,
    /// The command takes effect but its confirmation never arrives.
    LostConfirmation,
}

struct PendingChange {
    visible_after_poll: u64,
    object_id: u32,
    raw: u32,
}

struct SimState {
    snapshot: Snapshot,
    pending: VecDeque<PendingChange>,
    confirmation_lag: u32,
    offline: bool,
    write_failure: WriteFailure,
    polls: u64,
    calls: Vec<DeviceCall>,
}

pub struct SimulatedDevice {
    state: Mutex<SimState>,
}

impl SimulatedDevice {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(SimState {
                snapshot,
                pending: VecDeque::new(),
                confirmation_lag: 0,
                offline: false,
                write_failure: WriteFailure::None,
                polls: 0,
                calls: Vec::new(),
            }),
        }
    }

    /// Load the served snapshot from a JSON fixture.
    pub fn from_fixture(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::new(Snapshot::from_json(&raw)?))
    }

    /// Number of polls that keep reporting the old relay value after a
    /// command was accepted.
    #[must_use]
    pub fn with_confirmation_lag(mut self, polls: u32) -> Self {
        self.state.get_mut().confirmation_lag = polls;
        self
    }

    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    pub async fn set_write_failure(&self, failure: WriteFailure) {
        self.state.lock().await.write_failure = failure;
    }

    /// Mutate the served device state directly (label edits, sensor drift).
    pub async fn modify<F: FnOnce(&mut Snapshot)>(&self, f: F) {
        f(&mut self.state.lock().await.snapshot);
    }

    pub async fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn poll_count(&self) -> u64 {
        self.state.lock().await.polls
    }

    async fn write(&self, call: DeviceCall) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(Error::Transport {
                message: "device unreachable".into(),
            });
        }
        if state.write_failure == WriteFailure::Reject {
            return Err(Error::Rejected {
                message: "command refused".into(),
            });
        }
        debug!(?call, "simulated device accepted write");
        state.calls.push(call);
        Ok(())
    }

    async fn relay(&self, relay: &DataObject, command: RelayCommand) -> Result<u32, Error> {
        let channel = relay.relay_channel();
        {
            let state = self.state.lock().await;
            let known = state
                .snapshot
                .object(relay.id)
                .is_some_and(DataObject::is_relay);
            if !known {
                return Err(Error::UnknownRelay { channel });
            }
        }

        self.write(DeviceCall::Relay { channel, command }).await?;

        let mut state = self.state.lock().await;
        let current = state
            .snapshot
            .object(relay.id)
            .map(DataObject::relay_state)
            .unwrap_or(RelayState {
                auto: true,
                on: false,
            });
        let next = match command {
            RelayCommand::Auto => RelayState {
                auto: true,
                on: current.on,
            },
            RelayCommand::On => RelayState {
                auto: false,
                on: true,
            },
            RelayCommand::Off => RelayState {
                auto: false,
                on: false,
            },
        };
        let visible_after_poll = state.polls + u64::from(state.confirmation_lag);
        state.pending.push_back(PendingChange {
            visible_after_poll,
            object_id: relay.id,
            raw: next.raw(),
        });

        if state.write_failure == WriteFailure::LostConfirmation {
            return Err(Error::Timeout { timeout_secs: 5 });
        }
        Ok(channel)
    }
}

#[async_trait]
impl DeviceApi for SimulatedDevice {
    async fn poll(&self) -> Result<Snapshot, Error> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(Error::Transport {
                message: "device unreachable".into(),
            });
        }
        state.polls += 1;

        let polls = state.polls;
        while state
            .pending
            .front()
            .is_some_and(|p| p.visible_after_poll < polls)
        {
            let Some(change) = state.pending.pop_front() else {
                break;
            };
            if let Some(obj) = state
                .snapshot
                .objects
                .iter_mut()
                .find(|o| o.id == change.object_id)
            {
                obj.value = f64::from(change.raw);
            }
        }

        Ok(state.snapshot.clone())
    }

    async fn set_auto(&self, relay: &DataObject) -> Result<u32, Error> {
        self.relay(relay, RelayCommand::Auto).await
    }

    async fn set_on(&self, relay: &DataObject) -> Result<u32, Error> {
        self.relay(relay, RelayCommand::On).await
    }

    async fn set_off(&self, relay: &DataObject) -> Result<u32, Error> {
        self.relay(relay, RelayCommand::Off).await
    }

    async fn set_timer(&self, channel: u32, seconds: u32) -> Result<(), Error> {
        self.write(DeviceCall::Timer { channel, seconds }).await
    }

    async fn set_chlorine_dosage(&self, seconds: u32) -> Result<(), Error> {
        self.write(DeviceCall::Dosage {
            target: DosageTarget::Chlorine,
            seconds,
        })
        .await
    }

    async fn set_ph_minus_dosage(&self, seconds: u32) -> Result<(), Error> {
        self.write(DeviceCall::Dosage {
            target: DosageTarget::PhMinus,
            seconds,
        })
        .await
    }

    async fn set_ph_plus_dosage(&self, seconds: u32) -> Result<(), Error> {
        self.write(DeviceCall::Dosage {
            target: DosageTarget::PhPlus,
            seconds,
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Category;
    use pretty_assertions::assert_eq;

    fn pump() -> DataObject {
        DataObject {
            id: 16,
            category: Category::Relays,
            category_id: 1,
            label: "Pump".into(),
            value: 0.0,
            display_value: "Auto (off)".into(),
            unit: String::new(),
            active: true,
        }
    }

    fn device() -> SimulatedDevice {
        SimulatedDevice::new(Snapshot {
            objects: vec![pump()],
            ..Snapshot::default()
        })
    }

    #[tokio::test]
    async fn relay_command_is_visible_on_next_poll_without_lag() {
        let dev = device();
        assert_eq!(dev.set_on(&pump()).await.unwrap(), 1);
        let snap = dev.poll().await.unwrap();
        assert_eq!(snap.object(16).unwrap().value, 3.0);
        assert_eq!(
            dev.calls().await,
            vec![DeviceCall::Relay {
                channel: 1,
                command: RelayCommand::On
            }]
        );
    }

    #[tokio::test]
    async fn confirmation_lag_delays_visibility() {
        let dev = device().with_confirmation_lag(1);
        dev.set_off(&pump()).await.unwrap();
        assert_eq!(dev.poll().await.unwrap().object(16).unwrap().value, 0.0);
        assert_eq!(dev.poll().await.unwrap().object(16).unwrap().value, 2.0);
    }

    #[tokio::test]
    async fn auto_keeps_current_output() {
        let dev = device();
        dev.modify(|s| s.objects[0].value = 3.0).await;
        dev.set_auto(&pump()).await.unwrap();
        assert_eq!(dev.poll().await.unwrap().object(16).unwrap().value, 1.0);
    }

    #[tokio::test]
    async fn lost_confirmation_still_applies() {
        let dev = device();
        dev.set_write_failure(WriteFailure::LostConfirmation).await;
        assert!(matches!(
            dev.set_on(&pump()).await,
            Err(Error::Timeout { .. })
        ));
        assert_eq!(dev.poll().await.unwrap().object(16).unwrap().value, 3.0);
    }

    #[tokio::test]
    async fn rejected_write_changes_nothing() {
        let dev = device();
        dev.set_write_failure(WriteFailure::Reject).await;
        assert!(dev.set_timer(2, 60).await.is_err());
        assert!(dev.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_relay_is_refused() {
        let dev = device();
        let mut ghost = pump();
        ghost.id = 99;
        assert!(matches!(
            dev.set_auto(&ghost).await,
            Err(Error::UnknownRelay { channel: 1 })
        ));
    }

    #[tokio::test]
    async fn offline_device_fails_polls() {
        let dev = device();
        dev.set_offline(true).await;
        assert!(dev.poll().await.unwrap_err().is_transient());
        assert_eq!(dev.poll_count().await, 0);
    }
}
