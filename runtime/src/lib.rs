//! # todo-sync runtime
//!
//! Runtime for todo list views.
//!
//! A [`View`] is one independently mounted surface (an editing page, a stats
//! page, a CLI invocation). It owns its own snapshot of the collection, runs
//! the todo list reducer, and executes the reducer's persistence effects
//! against its slot.
//!
//! ## Synchronization
//!
//! - Each view loads the slot when it is mounted. There is no shared
//!   in-memory collection between views.
//! - A view that must follow writes made by other views calls
//!   [`View::watch`]. The watcher listens to the store's change notifications
//!   and reloads the slot on every change made by another handle.
//! - Writes are full-collection overwrites with no locking. If two views
//!   mutate concurrently, the last write wins and the other change is lost.
//! - Store calls are synchronous. A view runs them on Tokio's blocking pool,
//!   holding only its own lock, so a slow store never stalls the runtime.
//!
//! ## Example
//!
//! ```ignore
//! use todo_sync_runtime::{View, ViewConfig};
//!
//! let config = ViewConfig::from_env()?;
//! let editor = View::mount(store.clone(), environment.clone(), &config)?;
//! let stats = View::mount(store, environment, &config)?;
//! let _watch = stats.watch();
//!
//! editor.add("Buy milk").await?;
//! // `stats` reloads once the store reports the write
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use todo_sync_core::collection::TodoCollection;
use todo_sync_core::effect::Effect;
use todo_sync_core::list::{TodoListAction, TodoListEnvironment, TodoListReducer, TodoListState};
use todo_sync_core::reducer::Reducer;
use todo_sync_core::stats::Stats;
use todo_sync_core::storage::{CorruptSlotPolicy, KeyValueStore, TodoSlot};
use todo_sync_core::todo::{Todo, TodoId, ValidationError};
use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::JoinHandle;

/// Environment-driven view configuration
pub mod config;

/// Directory-backed key-value store with file-watch notifications
pub mod file_store;

pub use config::{ConfigError, ViewConfig};
pub use error::ViewError;
pub use file_store::FileStore;

/// Error types for the view runtime
pub mod error {
    use thiserror::Error;
    use todo_sync_core::storage::PersistenceError;

    /// Errors that can occur during View operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ViewError {
        /// Loading or saving the slot failed
        ///
        /// On a failed save the in-memory snapshot has already changed; the
        /// slot keeps its previous value until the next successful write.
        #[error(transparent)]
        Persistence(#[from] PersistenceError),

        /// The blocking task running store I/O did not complete
        #[error("Store task failed: {0}")]
        TaskFailed(String),
    }
}

/// One mounted view of the todo list
///
/// Clones share the same snapshot; separate [`View::mount`] calls do not.
#[derive(Clone)]
pub struct View {
    state: Arc<RwLock<TodoListState>>,
    reducer: TodoListReducer,
    environment: TodoListEnvironment,
    slot: TodoSlot,
    policy: CorruptSlotPolicy,
    /// Latest snapshot for observers (renderers, stats panels)
    snapshot: Arc<watch::Sender<TodoCollection>>,
}

impl View {
    /// Mounts a view: binds the configured slot and loads it.
    ///
    /// An absent slot mounts as an empty list. A malformed slot is handled
    /// according to [`ViewConfig::on_corrupt`].
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Persistence`] if the store cannot be read, or if
    /// the slot is malformed and the policy is
    /// [`CorruptSlotPolicy::Propagate`].
    #[tracing::instrument(skip(store, environment, config), fields(slot = %config.slot))]
    pub fn mount(
        store: Arc<dyn KeyValueStore>,
        environment: TodoListEnvironment,
        config: &ViewConfig,
    ) -> Result<Self, ViewError> {
        let slot = TodoSlot::new(store, config.slot.clone());
        let todos = slot.load_or_empty(config.on_corrupt)?;
        tracing::info!(count = todos.len(), origin = ?slot.origin(), "Mounted view");

        let (snapshot, _) = watch::channel(todos.clone());
        Ok(Self {
            state: Arc::new(RwLock::new(TodoListState::hydrated(todos))),
            reducer: TodoListReducer::new(),
            environment,
            slot,
            policy: config.on_corrupt,
            snapshot: Arc::new(snapshot),
        })
    }

    /// Send an action through the reducer and execute its effects.
    ///
    /// The reducer and every effect it returns run while this view's write
    /// lock is held, so actions on one view are processed one at a time and
    /// persisted in the order they were reduced. Actions fed back by reload
    /// effects are processed before this call returns.
    ///
    /// Store I/O is synchronous (a [`FileStore`] reads and writes files), so
    /// the whole dispatch runs on Tokio's blocking pool.
    ///
    /// # Errors
    ///
    /// - [`ViewError::Persistence`] if a save or reload fails
    /// - [`ViewError::TaskFailed`] if the blocking task was cancelled
    #[tracing::instrument(skip(self, action), name = "view_send")]
    pub async fn send(&self, action: TodoListAction) -> Result<(), ViewError> {
        self.with_state_blocking(move |view, state| view.dispatch(state, action))
            .await?
    }

    /// Creates a todo from user input.
    ///
    /// Returns the new todo, or `None` if the input was blank; in that case
    /// nothing is written and [`View::last_error`] reports the reason.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Persistence`] if saving fails.
    pub async fn add(&self, text: impl Into<String>) -> Result<Option<Todo>, ViewError> {
        let action = TodoListAction::Create { text: text.into() };
        self.with_state_blocking(move |view, state| -> Result<Option<Todo>, ViewError> {
            let before = state.todos.len();
            view.dispatch(state, action)?;

            if state.todos.len() > before {
                Ok(state.todos.entries().last().map(|todo| Todo::clone(todo)))
            } else {
                Ok(None)
            }
        })
        .await?
    }

    /// Flips a todo's completion. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Persistence`] if saving fails.
    pub async fn toggle(&self, id: impl Into<TodoId>) -> Result<(), ViewError> {
        self.send(TodoListAction::Toggle { id: id.into() }).await
    }

    /// Deletes a todo. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Persistence`] if saving fails.
    pub async fn remove(&self, id: impl Into<TodoId>) -> Result<(), ViewError> {
        self.send(TodoListAction::Remove { id: id.into() }).await
    }

    /// Re-reads the slot, replacing this view's snapshot.
    ///
    /// Like [`View::send`], the read runs on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Persistence`] if the slot cannot be loaded under
    /// the configured policy.
    pub async fn reload(&self) -> Result<(), ViewError> {
        self.send(TodoListAction::StorageChanged).await
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let pending = view.state(|s| s.pending().len()).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&TodoListState) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Current snapshot
    pub async fn todos(&self) -> TodoCollection {
        self.state(|s| s.todos.clone()).await
    }

    /// Stats of the current snapshot
    pub async fn stats(&self) -> Stats {
        self.state(TodoListState::stats).await
    }

    /// Why the last creation attempt was rejected, if it was
    pub async fn last_error(&self) -> Option<ValidationError> {
        self.state(|s| s.last_error.clone()).await
    }

    /// Observe snapshot changes.
    ///
    /// The receiver is marked changed whenever the collection differs from
    /// the previously published one, whether by a local action or a reload.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TodoCollection> {
        self.snapshot.subscribe()
    }

    /// Key of the slot this view is bound to
    #[must_use]
    pub fn slot_key(&self) -> &str {
        self.slot.key()
    }

    /// Start following writes made through other store handles.
    ///
    /// Notifications for this view's key from any other origin trigger a
    /// reload; this view's own writes are skipped. The subscription is taken
    /// before this returns, so no write after `watch()` can be missed.
    /// Watching stops when the returned handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use = "dropping the handle stops watching"]
    pub fn watch(&self) -> WatchHandle {
        let mut events = self.slot.subscribe();
        let own_origin = self.slot.origin();
        let key = self.slot.key().to_string();
        let view = self.clone();

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.key == key && event.origin != own_origin => {
                        tracing::debug!(origin = ?event.origin, "Slot changed elsewhere, reloading");
                        view.reload_logged().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed notifications may include ours; reload anyway
                        tracing::warn!(skipped, "Storage notifications lagged, reloading");
                        view.reload_logged().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Storage notification channel closed, stopping watch");
                        break;
                    }
                }
            }
        });

        WatchHandle { task }
    }

    async fn reload_logged(&self) {
        if let Err(error) = self.reload().await {
            tracing::warn!(%error, "Reload after storage change failed");
        }
    }

    /// Runs `work` on the blocking pool with this view's write lock held,
    /// then publishes the resulting snapshot.
    async fn with_state_blocking<T, F>(&self, work: F) -> Result<T, ViewError>
    where
        T: Send + 'static,
        F: FnOnce(&Self, &mut TodoListState) -> T + Send + 'static,
    {
        let mut state = Arc::clone(&self.state).write_owned().await;
        let view = self.clone();
        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                let output = work(&view, &mut *state);
                view.publish(&state);
                output
            })
        })
        .await
        .map_err(|e| ViewError::TaskFailed(e.to_string()))
    }

    /// Runs `action` and any actions fed back by its effects.
    fn dispatch(&self, state: &mut TodoListState, action: TodoListAction) -> Result<(), ViewError> {
        let mut queue = VecDeque::from([action]);

        while let Some(action) = queue.pop_front() {
            metrics::counter!("view.actions.total").increment(1);
            tracing::debug!(?action, "Processing action");

            let effects = self.reducer.reduce(state, action, &self.environment);
            tracing::trace!("Reducer completed, returned {} effects", effects.len());

            for effect in effects {
                if let Some(feedback) = self.execute_effect(effect)? {
                    queue.push_back(feedback);
                }
            }
        }

        Ok(())
    }

    /// Executes one effect, returning the action it feeds back (if any).
    fn execute_effect(
        &self,
        effect: Effect<TodoListAction>,
    ) -> Result<Option<TodoListAction>, ViewError> {
        match effect {
            Effect::Persist(todos) => {
                metrics::counter!("view.persist.total").increment(1);
                self.slot.save(&todos).inspect_err(|error| {
                    tracing::error!(%error, key = %self.slot.key(), "Persisting todos failed");
                })?;
                tracing::debug!(count = todos.len(), "Persisted todos");
                Ok(None)
            }
            Effect::Reload { on_loaded } => {
                metrics::counter!("view.reload.total").increment(1);
                let todos = self.slot.load_or_empty(self.policy)?;
                tracing::debug!(count = todos.len(), "Reloaded todos");
                Ok(Some(on_loaded(todos)))
            }
        }
    }

    fn publish(&self, state: &TodoListState) {
        self.snapshot.send_if_modified(|current| {
            if *current == state.todos {
                false
            } else {
                current.clone_from(&state.todos);
                true
            }
        });
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("slot", &self.slot)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Running watch task started by [`View::watch`]
///
/// Aborts the task when dropped.
#[derive(Debug)]
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Whether the watch task has ended (store channel closed or aborted)
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
