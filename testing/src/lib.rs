//! # todo-sync testing
//!
//! Testing utilities and helpers for todo-sync.
//!
//! This crate provides:
//! - Deterministic implementations of environment traits (ids, clock)
//! - [`InMemoryStore`]: a key-value store with change notifications, one
//!   handle per simulated view
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - proptest strategies for todos and collections
//!
//! ## Example
//!
//! ```ignore
//! use todo_sync_testing::{InMemoryStore, SequentialIdGenerator};
//! use todo_sync_runtime::{View, ViewConfig};
//!
//! #[tokio::test]
//! async fn two_views() {
//!     let store = InMemoryStore::new();
//!     let editor = View::mount(store.handle(), env(), &ViewConfig::default())?;
//!     let stats = View::mount(store.handle(), env(), &ViewConfig::default())?;
//!     let _watch = stats.watch();
//!
//!     editor.add("Buy milk").await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use todo_sync_core::environment::{Clock, IdGenerator};

pub mod memory;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use todo_sync_testing::mocks::FixedClock;
    /// use todo_sync_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Predictable ids: `"1"`, `"2"`, `"3"`, ...
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Starts at `"1"`
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        /// Continues after `last`, so the first id is `last + 1`
        #[must_use]
        pub const fn starting_after(last: u64) -> Self {
            Self {
                next: AtomicU64::new(last),
            }
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            (self.next.fetch_add(1, Ordering::SeqCst) + 1).to_string()
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use todo_sync_core::collection::TodoCollection;
    use todo_sync_core::todo::Todo;

    /// Text that survives trimming: printable, with at least one
    /// non-whitespace character, optionally padded.
    pub fn todo_text() -> impl Strategy<Value = String> {
        ("[ \t]{0,3}", "[a-zA-Z0-9][a-zA-Z0-9 ,.!?'-]{0,40}", "[ \t]{0,3}")
            .prop_map(|(pad_left, body, pad_right)| format!("{pad_left}{body}{pad_right}"))
    }

    /// Whitespace-only input, including the empty string
    pub fn blank_text() -> impl Strategy<Value = String> {
        "[ \t\n\r]{0,8}"
    }

    /// Collection of up to `max_len` todos with distinct ids `"1".."n"`
    pub fn todo_collection(max_len: usize) -> impl Strategy<Value = TodoCollection> {
        vec(("[a-zA-Z0-9][a-zA-Z0-9 ]{0,20}", any::<bool>()), 0..=max_len).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(index, (text, completed))| {
                    Todo::restore((index + 1).to_string(), text.trim(), completed)
                })
                .collect()
        })
    }

    /// Non-empty collection paired with the id of one of its entries
    pub fn collection_with_member(
        max_len: usize,
    ) -> impl Strategy<Value = (TodoCollection, String)> {
        todo_collection(max_len.max(1))
            .prop_filter("needs at least one todo", |todos| !todos.is_empty())
            .prop_flat_map(|todos| {
                let len = todos.len();
                (Just(todos), 1..=len).prop_map(|(todos, n)| (todos, n.to_string()))
            })
    }
}

// Re-export commonly used items
pub use memory::InMemoryStore;
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock};
pub use reducer_test::{ReducerTest, assertions};
