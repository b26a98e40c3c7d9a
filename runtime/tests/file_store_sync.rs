//! Integration tests for the directory-backed store
//!
//! Two `FileStore`s opened on one directory stand in for two processes
//! sharing the same data.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use todo_sync_core::list::TodoListEnvironment;
use todo_sync_core::storage::{KeyValueStore, Origin, StorageEvent};
use todo_sync_runtime::{FileStore, View, ViewConfig};
use todo_sync_testing::SequentialIdGenerator;
use tokio::sync::broadcast;

// File watchers are slower than in-memory channels
const TIMEOUT: Duration = Duration::from_secs(5);

fn environment() -> TodoListEnvironment {
    TodoListEnvironment::new(Arc::new(SequentialIdGenerator::new()))
}

/// Next event for `key`, skipping others
async fn next_event_for(rx: &mut broadcast::Receiver<StorageEvent>, key: &str) -> StorageEvent {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.key == key {
                return event;
            }
        }
    })
    .await
    .expect("no storage event in time")
}

#[tokio::test]
async fn other_handles_see_value_written() {
    let dir = tempfile::tempdir().unwrap();
    let a = FileStore::open(dir.path()).unwrap();
    let b = FileStore::open(dir.path()).unwrap();

    a.set("todos", "[]").unwrap();
    assert_eq!(b.get("todos").unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn external_file_write_is_reported_as_external() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let mut rx = store.subscribe();

    std::fs::write(dir.path().join("todos.json"), "[]").unwrap();

    let event = next_event_for(&mut rx, "todos").await;
    assert_eq!(event.new_value.as_deref(), Some("[]"));
    assert_eq!(event.origin, Origin::External);
}

#[tokio::test]
async fn own_write_carries_own_origin() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let mut rx = store.subscribe();

    store.set("todos", r#"[{"id":"1","text":"A","completed":false}]"#).unwrap();

    let event = next_event_for(&mut rx, "todos").await;
    assert_eq!(event.origin, store.origin());
}

#[tokio::test]
async fn views_on_separate_handles_stay_in_sync() {
    let dir = tempfile::tempdir().unwrap();
    let config = ViewConfig::default().with_data_dir(dir.path());

    let editor_store = Arc::new(FileStore::open(dir.path()).unwrap());
    let stats_store = Arc::new(FileStore::open(dir.path()).unwrap());

    let editor = View::mount(editor_store, environment(), &config).unwrap();
    let stats = View::mount(stats_store, environment(), &config).unwrap();
    let _watch = stats.watch();

    editor.add("Buy milk").await.unwrap();
    editor.toggle("1").await.unwrap();

    let mut rx = stats.subscribe();
    tokio::time::timeout(
        TIMEOUT,
        rx.wait_for(|todos| todos.iter().any(todo_sync_core::todo::Todo::completed)),
    )
    .await
    .expect("stats view did not follow the editor")
    .unwrap();

    assert_eq!(stats.stats().await.completion_rate, 100);
}

#[tokio::test]
async fn persisted_file_is_plain_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let view = View::mount(store, environment(), &ViewConfig::default()).unwrap();

    view.add("Walk dog").await.unwrap();

    let raw = std::fs::read_to_string(dir.path().join("todos.json")).unwrap();
    assert_eq!(raw, r#"[{"id":"1","text":"Walk dog","completed":false}]"#);
}

#[tokio::test]
async fn matching_content_from_another_handle_is_external() {
    let dir = tempfile::tempdir().unwrap();
    let a = FileStore::open(dir.path()).unwrap();
    let b = FileStore::open(dir.path()).unwrap();
    let mut rx = a.subscribe();

    a.set("todos", "X").unwrap();
    let event = next_event_for(&mut rx, "todos").await;
    assert_eq!(event.origin, a.origin());

    b.set("todos", "Y").unwrap();
    let event = next_event_for(&mut rx, "todos").await;
    assert_eq!(event.new_value.as_deref(), Some("Y"));
    assert_eq!(event.origin, Origin::External);

    // Same bytes a wrote earlier, but b wrote them this time
    b.set("todos", "X").unwrap();
    let event = next_event_for(&mut rx, "todos").await;
    assert_eq!(event.new_value.as_deref(), Some("X"));
    assert_eq!(event.origin, Origin::External);
}

#[tokio::test]
async fn watching_view_follows_toggle_back_to_its_own_content() {
    let dir = tempfile::tempdir().unwrap();
    let config = ViewConfig::default().with_data_dir(dir.path());

    let first = View::mount(
        Arc::new(FileStore::open(dir.path()).unwrap()),
        environment(),
        &config,
    )
    .unwrap();
    let _watch = first.watch();
    first.add("Buy milk").await.unwrap();

    let second = View::mount(
        Arc::new(FileStore::open(dir.path()).unwrap()),
        environment(),
        &config,
    )
    .unwrap();

    let mut rx = first.subscribe();
    second.toggle("1").await.unwrap();
    tokio::time::timeout(
        TIMEOUT,
        rx.wait_for(|todos| todos.iter().any(todo_sync_core::todo::Todo::completed)),
    )
    .await
    .expect("first view did not see the toggle")
    .unwrap();

    // Restores exactly what the first view persisted itself
    second.toggle("1").await.unwrap();
    tokio::time::timeout(
        TIMEOUT,
        rx.wait_for(|todos| !todos.is_empty() && todos.iter().all(|t| !t.completed())),
    )
    .await
    .expect("first view did not see the toggle back")
    .unwrap();
}
