// ── In-memory object store ──
//
// `ObjectStore` backed by `DashMap`. Every `set_state` is broadcast as a
// `StateChange`; unacknowledged platform writes are also queued on each
// intent subscription so the engine's own echoes cannot push them out.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

use super::{ObjectStore, State, StateChange, StoreError, StoreObject};
use crate::model::ScalarValue;

const DEFAULT_CHANGE_CAPACITY: usize = 256;

pub struct MemoryStore {
    objects: DashMap<String, StoreObject>,
    states: DashMap<String, State>,
    /// Number of `set_state` calls per path.
    writes: DashMap<String, u64>,
    changes: broadcast::Sender<StateChange>,
    intents: Mutex<Vec<mpsc::UnboundedSender<StateChange>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANGE_CAPACITY)
    }

    /// `capacity` bounds how far a subscriber may lag behind.
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            objects: DashMap::new(),
            states: DashMap::new(),
            writes: DashMap::new(),
            changes,
            intents: Mutex::new(Vec::new()),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    pub fn object(&self, path: &str) -> Option<StoreObject> {
        self.objects.get(path).map(|r| r.value().clone())
    }

    /// All object paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.iter().map(|r| r.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn value(&self, path: &str) -> Option<ScalarValue> {
        self.states.get(path).map(|r| r.value().value.clone())
    }

    pub fn write_count(&self, path: &str) -> u64 {
        self.writes.get(path).map_or(0, |r| *r.value())
    }

    pub fn total_writes(&self) -> u64 {
        self.writes.iter().map(|r| *r.value()).sum()
    }

    /// Objects and their current states, keyed by path.
    pub fn to_json(&self) -> serde_json::Value {
        let dump: BTreeMap<String, serde_json::Value> = self
            .objects
            .iter()
            .map(|r| {
                let state = self.states.get(r.key()).map(|s| s.value().clone());
                (r.key().clone(), json!({ "object": r.value(), "state": state }))
            })
            .collect();
        json!(dump)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_object(&self, path: &str, object: StoreObject) -> Result<bool, StoreError> {
        match self.objects.entry(path.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(object);
                Ok(true)
            }
        }
    }

    async fn get_object(&self, path: &str) -> Result<Option<StoreObject>, StoreError> {
        Ok(self.object(path))
    }

    async fn extend_object_name(&self, path: &str, name: &str) -> Result<(), StoreError> {
        let mut obj = self.objects.get_mut(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_owned(),
        })?;
        name.clone_into(&mut obj.common.name);
        Ok(())
    }

    async fn set_state(&self, path: &str, value: ScalarValue, ack: bool) -> Result<(), StoreError> {
        if !self.objects.contains_key(path) {
            return Err(StoreError::NotFound {
                path: path.to_owned(),
            });
        }

        self.states.insert(
            path.to_owned(),
            State {
                value: value.clone(),
                ack,
                ts: Utc::now(),
            },
        );
        *self.writes.entry(path.to_owned()).or_insert(0) += 1;

        let change = StateChange {
            path: path.to_owned(),
            value,
            ack,
        };
        if !ack {
            self.intents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tx| tx.send(change.clone()).is_ok());
        }
        // No receivers is fine.
        let _ = self.changes.send(change);
        Ok(())
    }

    async fn get_state(&self, path: &str) -> Result<Option<State>, StoreError> {
        Ok(self.states.get(path).map(|r| r.value().clone()))
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    fn subscribe_intents(&self) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{Role, ValueType};

    fn flag(name: &str) -> StoreObject {
        StoreObject::state(name, Role::Indicator, ValueType::Boolean)
    }

    #[tokio::test]
    async fn ensure_object_never_overwrites() {
        let store = MemoryStore::new();
        assert!(store.ensure_object("a.b", flag("first")).await.unwrap());
        assert!(!store.ensure_object("a.b", flag("second")).await.unwrap());
        assert_eq!(store.object("a.b").unwrap().common.name, "first");
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn set_state_requires_object() {
        let store = MemoryStore::new();
        let err = store.set_state("a.b", true.into(), true).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound { path: "a.b".into() });
        assert_eq!(store.total_writes(), 0);
    }

    #[tokio::test]
    async fn set_state_counts_and_broadcasts() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();
        store.ensure_object("a.b", flag("flag")).await.unwrap();
        store.set_state("a.b", true.into(), false).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.path, "a.b");
        assert!(!change.ack);
        assert_eq!(store.value("a.b"), Some(ScalarValue::Bool(true)));
        assert_eq!(store.write_count("a.b"), 1);
        assert!(!store.get_state("a.b").await.unwrap().unwrap().ack);
    }

    #[tokio::test]
    async fn intent_stream_skips_acknowledged_writes_and_never_lags() {
        let store = MemoryStore::with_capacity(4);
        let mut intents = store.subscribe_intents();
        let mut changes = store.subscribe();
        store.ensure_object("a.b", flag("flag")).await.unwrap();
        store.ensure_object("a.c", flag("flag")).await.unwrap();

        store.set_state("a.b", true.into(), false).await.unwrap();
        for _ in 0..16 {
            store.set_state("a.c", true.into(), true).await.unwrap();
        }

        let intent = intents.try_recv().unwrap();
        assert_eq!(intent.path, "a.b");
        assert!(!intent.ack);
        assert!(intents.try_recv().is_err());
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }

    #[tokio::test]
    async fn dropped_intent_subscriber_is_pruned() {
        let store = MemoryStore::new();
        store.ensure_object("a.b", flag("flag")).await.unwrap();
        drop(store.subscribe_intents());
        store.set_state("a.b", true.into(), false).await.unwrap();
        assert!(store.intents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_updates_name_only() {
        let store = MemoryStore::new();
        store.ensure_object("a.b", flag("old")).await.unwrap();
        store.extend_object_name("a.b", "new").await.unwrap();
        let obj = store.object("a.b").unwrap();
        assert_eq!(obj.common.name, "new");
        assert_eq!(obj.common.role, Some(Role::Indicator));
        assert!(store.extend_object_name("x.y", "z").await.is_err());
    }

    #[tokio::test]
    async fn dump_contains_objects_and_states() {
        let store = MemoryStore::new();
        store.ensure_object("a.b", flag("flag")).await.unwrap();
        store.set_state("a.b", true.into(), true).await.unwrap();
        let dump = store.to_json();
        assert_eq!(dump["a.b"]["state"]["val"], json!(true));
        assert_eq!(dump["a.b"]["object"]["common"]["role"], json!("indicator"));
    }
}
