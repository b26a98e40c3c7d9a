//! Key-value store contract and the todo persistence slot.
//!
//! The collection lives under a single key of an external [`KeyValueStore`]
//! (a browser's local storage, a directory of files, an in-memory map). The
//! [`TodoSlot`] adapter is the only code that reads or writes that key.
//!
//! # Write model
//!
//! Each save serializes the full collection and overwrites the key with one
//! `set`. There is no locking and no version check: when two views race, the
//! last write wins and the other view's change is lost. Views learn about
//! writes made elsewhere only through [`KeyValueStore::subscribe`].
//!
//! # Format
//!
//! A JSON array of `{"id": string, "text": string, "completed": bool}`.

use crate::collection::TodoCollection;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;

/// Key the collection is stored under unless configured otherwise
pub const DEFAULT_SLOT: &str = "todos";

/// Errors from the underlying key-value store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Reading or writing the backing medium failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The key cannot be represented by this store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The store is not usable (watcher failed, directory missing, ...)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from loading or saving the todo slot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The slot holds data that is not a valid todo array
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The collection could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store itself failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Who performed a write
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A store handle in this process
    Handle(u64),
    /// Another process, or a writer that cannot be identified
    External,
}

impl Origin {
    /// Allocates a process-unique handle origin
    #[must_use]
    pub fn next_handle() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self::Handle(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Notification that the value under `key` changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed
    pub key: String,
    /// Value after the change, `None` when removed
    pub new_value: Option<String>,
    /// Writer of the change
    pub origin: Origin,
}

/// External key-value store with change notification.
///
/// A store value is a *handle*: every handle has its own [`Origin`], and
/// events for its own writes carry that origin so the writer can skip them.
/// Reads and writes are synchronous; notifications arrive asynchronously.
pub trait KeyValueStore: Send + Sync {
    /// Origin stamped on events caused by this handle
    fn origin(&self) -> Origin;

    /// Reads the value under `key`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites the value under `key`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes `key`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the delete fails.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribes to change notifications for all keys
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
}

/// What to do when the slot holds malformed data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptSlotPolicy {
    /// Log a warning and continue with an empty collection
    #[default]
    TreatAsEmpty,
    /// Return the deserialization error to the caller
    Propagate,
}

impl FromStr for CorruptSlotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empty" | "treat_as_empty" => Ok(Self::TreatAsEmpty),
            "error" | "propagate" => Ok(Self::Propagate),
            other => Err(format!("unknown corrupt slot policy: {other}")),
        }
    }
}

/// Encodes a collection in the slot format.
///
/// # Errors
///
/// Returns [`PersistenceError::Serialization`] if encoding fails.
pub fn serialize(todos: &TodoCollection) -> Result<String, PersistenceError> {
    serde_json::to_string(todos).map_err(|e| PersistenceError::Serialization(e.to_string()))
}

/// Decodes a collection from the slot format.
///
/// # Errors
///
/// Returns [`PersistenceError::Deserialization`] for anything other than an
/// array of well-formed todo objects.
pub fn deserialize(raw: &str) -> Result<TodoCollection, PersistenceError> {
    serde_json::from_str(raw).map_err(|e| PersistenceError::Deserialization(e.to_string()))
}

/// Persistence adapter for one todo collection
#[derive(Clone)]
pub struct TodoSlot {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl TodoSlot {
    /// Binds a slot to `key` in `store`
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Binds a slot to [`DEFAULT_SLOT`]
    #[must_use]
    pub fn with_default_key(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, DEFAULT_SLOT)
    }

    /// Key this slot reads and writes
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Origin of the underlying store handle
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.store.origin()
    }

    /// Subscribes to the underlying store's notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.store.subscribe()
    }

    /// Reads the collection. `Ok(None)` means the slot has never been written.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::Deserialization`] if the slot holds malformed data
    /// - [`PersistenceError::Storage`] if the store cannot be read
    pub fn load(&self) -> Result<Option<TodoCollection>, PersistenceError> {
        self.store
            .get(&self.key)?
            .map(|raw| deserialize(&raw))
            .transpose()
    }

    /// Reads the collection, treating an absent slot as empty and a malformed
    /// one according to `policy`.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::Deserialization`] under [`CorruptSlotPolicy::Propagate`]
    /// - [`PersistenceError::Storage`] if the store cannot be read
    pub fn load_or_empty(
        &self,
        policy: CorruptSlotPolicy,
    ) -> Result<TodoCollection, PersistenceError> {
        match self.load() {
            Ok(todos) => Ok(todos.unwrap_or_default()),
            Err(PersistenceError::Deserialization(reason))
                if policy == CorruptSlotPolicy::TreatAsEmpty =>
            {
                tracing::warn!(key = %self.key, %reason, "Malformed todo slot, treating as empty");
                Ok(TodoCollection::new())
            }
            Err(error) => Err(error),
        }
    }

    /// Overwrites the slot with the full collection.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if encoding or the write fails.
    pub fn save(&self, todos: &TodoCollection) -> Result<(), PersistenceError> {
        let raw = serialize(todos)?;
        self.store.set(&self.key, &raw)?;
        tracing::trace!(key = %self.key, count = todos.len(), "Saved todo slot");
        Ok(())
    }
}

impl std::fmt::Debug for TodoSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoSlot")
            .field("key", &self.key)
            .field("origin", &self.store.origin())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::Todo;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapStore {
        origin: Origin,
        data: Mutex<HashMap<String, String>>,
        tx: broadcast::Sender<StorageEvent>,
    }

    impl MapStore {
        fn new() -> Self {
            Self {
                origin: Origin::next_handle(),
                data: Mutex::new(HashMap::new()),
                tx: broadcast::channel(8).0,
            }
        }
    }

    impl KeyValueStore for MapStore {
        fn origin(&self) -> Origin {
            self.origin
        }

        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
            self.tx.subscribe()
        }
    }

    fn slot() -> (Arc<MapStore>, TodoSlot) {
        let store = Arc::new(MapStore::new());
        let slot = TodoSlot::with_default_key(store.clone());
        (store, slot)
    }

    #[test]
    fn absent_slot_loads_none() {
        let (_, slot) = slot();
        assert_eq!(slot.load(), Ok(None));
        assert_eq!(
            slot.load_or_empty(CorruptSlotPolicy::Propagate),
            Ok(TodoCollection::new())
        );
    }

    #[test]
    fn save_writes_json_array() {
        let (store, slot) = slot();
        let todos: TodoCollection = [Todo::restore("1", "A", false), Todo::restore("2", "B", true)]
            .into_iter()
            .collect();

        slot.save(&todos).unwrap();

        assert_eq!(
            store.get("todos").unwrap().as_deref(),
            Some(r#"[{"id":"1","text":"A","completed":false},{"id":"2","text":"B","completed":true}]"#)
        );
        assert_eq!(slot.load(), Ok(Some(todos)));
    }

    #[test]
    fn malformed_slot_fails_to_load() {
        let (store, slot) = slot();
        store.set("todos", "{not json").unwrap();
        assert!(matches!(
            slot.load(),
            Err(PersistenceError::Deserialization(_))
        ));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let (store, slot) = slot();
        store.set("todos", r#"[{"id":1,"text":"A"}]"#).unwrap();
        assert!(matches!(
            slot.load(),
            Err(PersistenceError::Deserialization(_))
        ));
    }

    #[test]
    fn corrupt_slot_policy() {
        let (store, slot) = slot();
        store.set("todos", "garbage").unwrap();

        assert_eq!(
            slot.load_or_empty(CorruptSlotPolicy::TreatAsEmpty),
            Ok(TodoCollection::new())
        );
        assert!(matches!(
            slot.load_or_empty(CorruptSlotPolicy::Propagate),
            Err(PersistenceError::Deserialization(_))
        ));
    }

    #[test]
    fn policy_parses_from_config_values() {
        assert_eq!("empty".parse(), Ok(CorruptSlotPolicy::TreatAsEmpty));
        assert_eq!("ERROR".parse(), Ok(CorruptSlotPolicy::Propagate));
        assert!("maybe".parse::<CorruptSlotPolicy>().is_err());
    }

    #[test]
    fn handle_origins_are_distinct() {
        assert_ne!(Origin::next_handle(), Origin::next_handle());
    }
}
