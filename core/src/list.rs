//! Reducer for a single view's todo list.
//!
//! The reducer owns the view's in-memory snapshot. User intents go through
//! the pure collection operations; every intent that changes the collection
//! is followed by an [`Effect::Persist`] of the full result. Snapshots read
//! from the slot arrive as [`TodoListAction::Hydrate`] and never persist.

use crate::collection::{TodoCollection, append, filter_by_completion, remove, toggle};
use crate::effect::Effect;
use crate::environment::IdGenerator;
use crate::reducer::Reducer;
use crate::stats::{Stats, compute_stats};
use crate::todo::{TodoId, ValidationError, create_todo};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

/// State of one view's todo list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoListState {
    /// Current snapshot
    pub todos: TodoCollection,
    /// Last rejected input (if any)
    pub last_error: Option<ValidationError>,
}

impl TodoListState {
    /// Creates an empty list
    #[must_use]
    pub const fn new() -> Self {
        Self {
            todos: TodoCollection::new(),
            last_error: None,
        }
    }

    /// Creates a list from a loaded snapshot
    #[must_use]
    pub const fn hydrated(todos: TodoCollection) -> Self {
        Self {
            todos,
            last_error: None,
        }
    }

    /// Stats of the current snapshot
    #[must_use]
    pub fn stats(&self) -> Stats {
        compute_stats(&self.todos)
    }

    /// Completed todos, in order
    #[must_use]
    pub fn completed(&self) -> TodoCollection {
        filter_by_completion(&self.todos, true)
    }

    /// Pending todos, in order
    #[must_use]
    pub fn pending(&self) -> TodoCollection {
        filter_by_completion(&self.todos, false)
    }
}

/// Inputs to the todo list reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoListAction {
    /// User submitted new todo text
    Create {
        /// Raw input, trimmed during validation
        text: String,
    },

    /// User flipped a todo's completion
    Toggle {
        /// Todo to flip
        id: TodoId,
    },

    /// User deleted a todo
    Remove {
        /// Todo to delete
        id: TodoId,
    },

    /// Snapshot read from the slot
    Hydrate {
        /// Full collection as stored
        todos: TodoCollection,
    },

    /// Another view wrote the slot
    StorageChanged,
}

/// Environment dependencies for the todo list reducer
#[derive(Clone)]
pub struct TodoListEnvironment {
    /// Source of identifiers for new todos
    pub ids: Arc<dyn IdGenerator>,
}

impl TodoListEnvironment {
    /// Creates a new `TodoListEnvironment`
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }
}

impl std::fmt::Debug for TodoListEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoListEnvironment").finish_non_exhaustive()
    }
}

/// Skips identifiers already present in the snapshot, so a generator that
/// restarts (a new process, a sequential test generator) cannot produce a
/// duplicate within the collection.
struct UnusedIds<'a> {
    inner: &'a dyn IdGenerator,
    taken: &'a TodoCollection,
}

impl IdGenerator for UnusedIds<'_> {
    fn next_id(&self) -> String {
        let mut id = self.inner.next_id();
        // At most `len` ids can be taken, so `len + 1` draws always suffice
        // for a generator that does not repeat itself.
        for _ in 0..self.taken.len() {
            if !self.taken.contains(&TodoId::new(id.as_str())) {
                break;
            }
            id = self.inner.next_id();
        }
        id
    }
}

/// Reducer for the todo list
#[derive(Clone, Copy, Debug, Default)]
pub struct TodoListReducer;

impl TodoListReducer {
    /// Creates a new `TodoListReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Replaces the snapshot and asks for it to be persisted, unless nothing
    /// changed.
    fn commit(
        state: &mut TodoListState,
        next: TodoCollection,
    ) -> SmallVec<[Effect<TodoListAction>; 4]> {
        state.last_error = None;
        if next == state.todos {
            return SmallVec::new();
        }
        state.todos = next;
        smallvec![Effect::Persist(state.todos.clone())]
    }
}

impl Reducer for TodoListReducer {
    type State = TodoListState;
    type Action = TodoListAction;
    type Environment = TodoListEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== User intents ==========
            TodoListAction::Create { text } => {
                let ids = UnusedIds {
                    inner: env.ids.as_ref(),
                    taken: &state.todos,
                };
                match create_todo(&text, &ids) {
                    Ok(todo) => {
                        let next = append(&state.todos, todo);
                        Self::commit(state, next)
                    }
                    Err(error) => {
                        state.last_error = Some(error);
                        SmallVec::new()
                    }
                }
            }

            TodoListAction::Toggle { id } => {
                let next = toggle(&state.todos, &id);
                Self::commit(state, next)
            }

            TodoListAction::Remove { id } => {
                let next = remove(&state.todos, &id);
                Self::commit(state, next)
            }

            // ========== Slot synchronization ==========
            TodoListAction::Hydrate { todos } => {
                state.todos = todos;
                SmallVec::new()
            }

            TodoListAction::StorageChanged => smallvec![Effect::Reload {
                on_loaded: |todos| TodoListAction::Hydrate { todos },
            }],
        }
    }
}
