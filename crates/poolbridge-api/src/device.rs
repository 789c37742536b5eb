// ── Device access interface ──
//
// Everything the engine needs from the pool controller: one poll call that
// returns a decoded snapshot, and the write commands for relays, timers,
// and dosage channels. Implementations own the wire protocol.

use async_trait::async_trait;

use crate::error::Error;
use crate::model::{DataObject, DosageTarget, Snapshot};

/// A physical relay command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    Auto,
    On,
    Off,
}

#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Fetch and decode one full device snapshot.
    async fn poll(&self) -> Result<Snapshot, Error>;

    /// Put a relay into automatic mode. Returns the physical relay channel.
    async fn set_auto(&self, relay: &DataObject) -> Result<u32, Error>;

    /// Switch a relay on manually. Returns the physical relay channel.
    async fn set_on(&self, relay: &DataObject) -> Result<u32, Error>;

    /// Switch a relay off manually. Returns the physical relay channel.
    async fn set_off(&self, relay: &DataObject) -> Result<u32, Error>;

    /// Arm the generic timer of a relay channel.
    async fn set_timer(&self, channel: u32, seconds: u32) -> Result<(), Error>;

    async fn set_chlorine_dosage(&self, seconds: u32) -> Result<(), Error>;

    async fn set_ph_minus_dosage(&self, seconds: u32) -> Result<(), Error>;

    async fn set_ph_plus_dosage(&self, seconds: u32) -> Result<(), Error>;

    /// Route a relay command to the matching setter.
    async fn send_relay(&self, relay: &DataObject, command: RelayCommand) -> Result<u32, Error> {
        match command {
            RelayCommand::Auto => self.set_auto(relay).await,
            RelayCommand::On => self.set_on(relay).await,
            RelayCommand::Off => self.set_off(relay).await,
        }
    }

    /// Route a timed dosage run to its command channel.
    async fn set_dosage(&self, target: DosageTarget, seconds: u32) -> Result<(), Error> {
        match target {
            DosageTarget::Chlorine => self.set_chlorine_dosage(seconds).await,
            DosageTarget::PhMinus => self.set_ph_minus_dosage(seconds).await,
            DosageTarget::PhPlus => self.set_ph_plus_dosage(seconds).await,
        }
    }
}
