//! Property tests for todo creation, collection operations, stats and the
//! slot format.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use std::sync::Arc;
use todo_sync_core::collection::{filter_by_completion, remove, toggle};
use todo_sync_core::stats::compute_stats;
use todo_sync_core::storage::{deserialize, serialize};
use todo_sync_core::todo::{TodoId, ValidationError, create_todo};
use todo_sync_testing::SequentialIdGenerator;
use todo_sync_testing::properties::{blank_text, collection_with_member, todo_collection};

proptest! {
    #[test]
    fn create_trims_and_starts_pending(text in todo_sync_testing::properties::todo_text()) {
        let todo = create_todo(&text, &SequentialIdGenerator::new()).unwrap();
        prop_assert_eq!(todo.text(), text.trim());
        prop_assert!(!todo.completed());
    }

    #[test]
    fn blank_text_is_rejected(text in blank_text()) {
        prop_assert_eq!(
            create_todo(&text, &SequentialIdGenerator::new()),
            Err(ValidationError::EmptyText)
        );
    }

    #[test]
    fn double_toggle_is_identity((todos, id) in collection_with_member(12)) {
        let id = TodoId::new(id);
        let once = toggle(&todos, &id);
        prop_assert_ne!(&once, &todos);
        prop_assert_eq!(toggle(&once, &id), todos);
    }

    #[test]
    fn toggle_shares_untouched_entries((todos, id) in collection_with_member(12)) {
        let id = TodoId::new(id);
        let toggled = toggle(&todos, &id);
        for (before, after) in todos.entries().iter().zip(toggled.entries()) {
            if before.id() == &id {
                prop_assert_eq!(before.completed(), !after.completed());
            } else {
                prop_assert!(Arc::ptr_eq(before, after));
            }
        }
    }

    #[test]
    fn unknown_id_is_a_no_op(todos in todo_collection(12)) {
        let missing = TodoId::new("nonexistent");
        prop_assert_eq!(&toggle(&todos, &missing), &todos);
        prop_assert_eq!(&remove(&todos, &missing), &todos);
    }

    #[test]
    fn remove_drops_exactly_one((todos, id) in collection_with_member(12)) {
        let id = TodoId::new(id);
        let removed = remove(&todos, &id);
        prop_assert_eq!(removed.len(), todos.len() - 1);
        prop_assert!(!removed.contains(&id));
    }

    #[test]
    fn filters_partition_the_collection(todos in todo_collection(12)) {
        let done = filter_by_completion(&todos, true);
        let open = filter_by_completion(&todos, false);
        prop_assert_eq!(done.len() + open.len(), todos.len());
        prop_assert!(done.iter().all(|t| t.completed()));
        prop_assert!(open.iter().all(|t| !t.completed()));
    }

    #[test]
    fn stats_are_consistent(todos in todo_collection(20)) {
        let stats = compute_stats(&todos);
        prop_assert_eq!(stats.total, todos.len());
        prop_assert_eq!(stats.completed + stats.pending, stats.total);
        prop_assert!(stats.completion_rate <= 100);
        if stats.total == 0 {
            prop_assert_eq!(stats.completion_rate, 0);
        }
        if stats.total > 0 && stats.completed == stats.total {
            prop_assert_eq!(stats.completion_rate, 100);
        }
    }

    #[test]
    fn slot_format_round_trips(todos in todo_collection(12)) {
        let raw = serialize(&todos).unwrap();
        prop_assert_eq!(deserialize(&raw).unwrap(), todos);
    }
}
