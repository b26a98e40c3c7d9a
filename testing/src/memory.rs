//! In-memory key-value store for fast, deterministic view tests.
//!
//! One [`InMemoryStore`] models a browser's local storage: a single map
//! shared by every view. Each call to [`InMemoryStore::handle`] gives a view
//! its own handle with its own [`Origin`], so notifications can be told apart
//! from the view's own writes.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use todo_sync_core::storage::{KeyValueStore, Origin, StorageError, StorageEvent};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct Shared {
    data: RwLock<BTreeMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

/// In-memory store shared by any number of handles.
///
/// # Example
///
/// ```
/// use todo_sync_testing::InMemoryStore;
/// use todo_sync_core::storage::KeyValueStore;
///
/// let store = InMemoryStore::new();
/// let editor = store.handle();
/// let stats = store.handle();
///
/// editor.set("todos", "[]").unwrap();
/// assert_eq!(stats.get("todos").unwrap().as_deref(), Some("[]"));
/// assert_ne!(editor.origin(), stats.origin());
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
    origin: Origin,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(BTreeMap::new()),
                events: broadcast::channel(CHANNEL_CAPACITY).0,
            }),
            origin: Origin::next_handle(),
        }
    }

    /// New handle on the same data, with its own origin
    #[must_use]
    pub fn handle(&self) -> Arc<dyn KeyValueStore> {
        Arc::new(self.sibling())
    }

    /// Same as [`handle`](Self::handle), but keeps the concrete type
    #[must_use]
    pub fn sibling(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            origin: Origin::next_handle(),
        }
    }

    /// Write a raw value as an outside process would, notifying every handle.
    pub fn write_external(&self, key: &str, value: &str) {
        self.insert(key, value, Origin::External);
    }

    /// Remove all keys (for test isolation). Sends no notifications.
    pub fn clear(&self) {
        self.shared.data.write().unwrap().clear();
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.data.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.data.read().unwrap().is_empty()
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.data.read().unwrap().contains_key(key)
    }

    /// All keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.shared.data.read().unwrap().keys().cloned().collect()
    }

    fn insert(&self, key: &str, value: &str, origin: Origin) {
        self.shared
            .data
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.notify(key, Some(value.to_string()), origin);
    }

    fn notify(&self, key: &str, new_value: Option<String>, origin: Origin) {
        // No receivers is fine: nobody is watching yet
        let _ = self.shared.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin,
        });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn origin(&self) -> Origin {
        self.origin
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.shared.data.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.insert(key, value, self.origin);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.shared.data.write().unwrap().remove(key);
        if removed.is_some() {
            self.notify(key, None, self.origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.shared.events.subscribe()
    }
}
