//! # todo-sync core
//!
//! Entity model, pure state operations and the persistence contract for a
//! todo list that several independent views read and write.
//!
//! ## Core Concepts
//!
//! - **Todo**: a task record (`id`, `text`, `completed`)
//! - **Collection**: ordered, append-only list of todos, shared immutably
//! - **Stats**: counts and completion rate derived from a collection
//! - **Slot**: the single key of an external key-value store holding the
//!   serialized collection
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`, the only
//!   place list state changes
//!
//! ## Architecture Principles
//!
//! - Pure operations: every operation returns a new collection
//! - Explicit effects: the reducer describes persistence, the runtime performs it
//! - Dependency injection via environment traits (clock, id generation)
//! - Full-collection writes, last writer wins
//!
//! ## Example
//!
//! ```
//! use todo_sync_core::collection::{append, toggle, TodoCollection};
//! use todo_sync_core::stats::compute_stats;
//! use todo_sync_core::todo::create_todo;
//! use todo_sync_core::environment::IdGenerator;
//!
//! struct Fixed;
//! impl IdGenerator for Fixed {
//!     fn next_id(&self) -> String {
//!         "1".to_string()
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let milk = create_todo("  Buy milk ", &Fixed)?;
//! let todos = append(&TodoCollection::new(), milk);
//! let todos = toggle(&todos, &"1".into());
//!
//! let stats = compute_stats(&todos);
//! assert_eq!(stats.completion_rate, 100);
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod list;
pub mod stats;
pub mod storage;
pub mod todo;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They validate input, update state in place and describe the I/O that has
/// to follow. They never touch the store themselves.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for list logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime, in order
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values returned from reducers. The view runtime executes them
/// against its persistence slot.
pub mod effect {
    use crate::collection::TodoCollection;

    /// Effect type - describes persistence work to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type a reload feeds back into the reducer
    pub enum Effect<Action> {
        /// Overwrite the slot with this full collection
        Persist(TodoCollection),

        /// Re-read the slot and feed the result back as an action
        Reload {
            /// Builds the action dispatched with the freshly loaded collection
            on_loaded: fn(TodoCollection) -> Action,
        },
    }

    // Manual Debug implementation since the callback is not meaningful to print
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::Persist(todos) => f.debug_tuple("Effect::Persist").field(todos).finish(),
                Effect::Reload { .. } => write!(f, "Effect::Reload(<callback>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Whether this effect writes to the slot
        #[must_use]
        pub const fn is_persist(&self) -> bool {
            matches!(self, Effect::Persist(_))
        }

        /// Whether this effect re-reads the slot
        #[must_use]
        pub const fn is_reload(&self) -> bool {
            matches!(self, Effect::Reload { .. })
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All nondeterminism (time, identifiers) sits behind traits injected via the
/// reducer environment, so tests can pin it down.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of fresh todo identifiers
    pub trait IdGenerator: Send + Sync {
        /// Produce the next identifier
        fn next_id(&self) -> String;
    }

    /// Millisecond-timestamp identifiers.
    ///
    /// Two calls within the same millisecond (or after the clock stepped back)
    /// still yield strictly increasing values.
    pub struct TimestampIdGenerator {
        clock: Arc<dyn Clock>,
        last: AtomicI64,
    }

    impl TimestampIdGenerator {
        /// Creates a generator reading time from `clock`
        #[must_use]
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                clock,
                last: AtomicI64::new(i64::MIN),
            }
        }
    }

    impl std::fmt::Debug for TimestampIdGenerator {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TimestampIdGenerator")
                .field("last", &self.last.load(Ordering::Relaxed))
                .finish_non_exhaustive()
        }
    }

    impl IdGenerator for TimestampIdGenerator {
        fn next_id(&self) -> String {
            let now = self.clock.now().timestamp_millis();
            let mut previous = self.last.load(Ordering::Acquire);
            loop {
                let candidate = now.max(previous.saturating_add(1));
                match self.last.compare_exchange_weak(
                    previous,
                    candidate,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return candidate.to_string(),
                    Err(actual) => previous = actual,
                }
            }
        }
    }

}
