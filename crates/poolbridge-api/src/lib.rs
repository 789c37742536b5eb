//! Device access layer for polled pool controllers.
//!
//! - **[`DeviceApi`]**: the interface the engine consumes: one `poll()`
//!   returning a decoded [`Snapshot`], plus relay (auto/on/off), timer and
//!   dosage write commands.
//! - **[`Poller`]**: start/stop wrapper that polls a device on a fixed
//!   interval and forwards every outcome over a channel.
//! - **[`SimulatedDevice`]**: in-process implementation serving snapshots
//!   from memory, with confirmation lag and failure injection.
//! - **Snapshot model** ([`model`]): `SystemInfo`, `DataObject`, `Category`.

pub mod device;
pub mod error;
pub mod model;
pub mod poller;
pub mod simulated;

pub use device::{DeviceApi, RelayCommand};
pub use error::Error;
pub use model::{
    Category, DataObject, DosageFlags, DosageTarget, RelayState, ScalarValue, Snapshot,
    SystemInfo, sys_keys,
};
pub use poller::{PollResult, Poller};
pub use simulated::{DeviceCall, SimulatedDevice, WriteFailure};
