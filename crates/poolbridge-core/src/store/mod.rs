// ── Object/state store ──
//
// The persistent hierarchical namespace the automation platform reads.
// The engine only needs idempotent create-if-absent, rename, and value
// get/set; everything else belongs to the platform.

mod memory;
mod object;
pub mod paths;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

pub use memory::MemoryStore;
pub use object::{
    ObjectCommon, ObjectKind, Role, SmartName, SmartType, State, StateChange, StoreObject,
    ValueType,
};

use crate::model::ScalarValue;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no object at {path}")]
    NotFound { path: String },

    #[error("store rejected {path}: {reason}")]
    Rejected { path: String, reason: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `path` unless it already exists. Returns `true` when the
    /// object was created by this call. Never overwrites.
    async fn ensure_object(&self, path: &str, object: StoreObject) -> Result<bool, StoreError>;

    async fn get_object(&self, path: &str) -> Result<Option<StoreObject>, StoreError>;

    /// Replace the display name of an existing object.
    async fn extend_object_name(&self, path: &str, name: &str) -> Result<(), StoreError>;

    async fn set_state(&self, path: &str, value: ScalarValue, ack: bool) -> Result<(), StoreError>;

    async fn get_state(&self, path: &str) -> Result<Option<State>, StoreError>;

    /// Receive every subsequent state change. Slow receivers may lag.
    fn subscribe(&self) -> broadcast::Receiver<StateChange>;

    /// Receive every subsequent unacknowledged change. Acknowledged
    /// writes never enter this stream and nothing is dropped from it.
    fn subscribe_intents(&self) -> mpsc::UnboundedReceiver<StateChange>;
}
