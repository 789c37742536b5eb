// poolbridge-core: reconciliation and command dispatch between a polled
// pool controller and a hierarchical object/state store.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod materialize;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{DeviceCommand, DispatchOutcome, Dispatcher, Intent};
pub use config::EngineConfig;
pub use engine::{ConnectionState, CycleSummary, Engine, EngineStatus};
pub use error::CoreError;
pub use materialize::{LabelKind, MaterializeReport, Materializer, classify_label};
pub use reconcile::{
    ForceUpdateLedger, ObjectUpdate, ReconciliationPlan, Reconciler, RenameAction, UpdateReason,
    reconcile,
};
pub use store::{MemoryStore, ObjectStore, StateChange, StoreError, StoreObject};
pub use writer::{WriteBatch, WriteReport};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Category, DataObject, DosageFlags, DosageTarget, Field, RelayEntry, ScalarValue, Snapshot,
    SystemInfo,
};
