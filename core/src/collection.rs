//! Ordered todo collections and the pure operations over them.
//!
//! Every operation takes a collection by reference and returns a new one.
//! Entries are held behind [`Arc`], so entries an operation does not touch are
//! shared with the input rather than copied. Operations on an id that is not
//! in the collection are no-ops, which keeps stale UI references harmless.

use crate::todo::{Todo, TodoId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Insertion-ordered list of todos
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoCollection(Vec<Arc<Todo>>);

impl TodoCollection {
    /// Creates an empty collection
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of todos
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no todos
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates todos in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Todo> {
        self.0.iter().map(entry)
    }

    /// Shared entries, in insertion order
    #[must_use]
    pub fn entries(&self) -> &[Arc<Todo>] {
        &self.0
    }

    /// Looks up a todo by id
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&Todo> {
        self.iter().find(|todo| todo.id() == id)
    }

    /// Whether a todo with this id exists
    #[must_use]
    pub fn contains(&self, id: &TodoId) -> bool {
        self.get(id).is_some()
    }
}

impl FromIterator<Todo> for TodoCollection {
    fn from_iter<I: IntoIterator<Item = Todo>>(iter: I) -> Self {
        Self(iter.into_iter().map(Arc::new).collect())
    }
}

impl<'a> IntoIterator for &'a TodoCollection {
    type Item = &'a Todo;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Arc<Todo>>, fn(&Arc<Todo>) -> &Todo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(entry as fn(&Arc<Todo>) -> &Todo)
    }
}

fn entry(todo: &Arc<Todo>) -> &Todo {
    todo
}

/// Returns `todos` with `todo` added at the end.
#[must_use]
pub fn append(todos: &TodoCollection, todo: Todo) -> TodoCollection {
    let mut entries = Vec::with_capacity(todos.len() + 1);
    entries.extend(todos.0.iter().cloned());
    entries.push(Arc::new(todo));
    TodoCollection(entries)
}

/// Flips `completed` on the todo with `id`.
#[must_use]
pub fn toggle(todos: &TodoCollection, id: &TodoId) -> TodoCollection {
    if !todos.contains(id) {
        return todos.clone();
    }

    todos
        .0
        .iter()
        .map(|todo| {
            if todo.id() == id {
                Arc::new(todo.toggled())
            } else {
                Arc::clone(todo)
            }
        })
        .collect::<Vec<_>>()
        .into()
}

/// Drops the todo with `id`, keeping the order of the rest.
#[must_use]
pub fn remove(todos: &TodoCollection, id: &TodoId) -> TodoCollection {
    todos
        .0
        .iter()
        .filter(|todo| todo.id() != id)
        .cloned()
        .collect::<Vec<_>>()
        .into()
}

/// Order-preserving subsequence of todos whose `completed` flag equals
/// `want_completed`.
#[must_use]
pub fn filter_by_completion(todos: &TodoCollection, want_completed: bool) -> TodoCollection {
    todos
        .0
        .iter()
        .filter(|todo| todo.completed() == want_completed)
        .cloned()
        .collect::<Vec<_>>()
        .into()
}

impl From<Vec<Arc<Todo>>> for TodoCollection {
    fn from(entries: Vec<Arc<Todo>>) -> Self {
        Self(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TodoCollection {
        [
            Todo::restore("1", "Todo 1", false),
            Todo::restore("2", "Todo 2", true),
            Todo::restore("3", "Todo 3", false),
            Todo::restore("4", "Todo 4", true),
        ]
        .into_iter()
        .collect()
    }

    fn texts(todos: &TodoCollection) -> Vec<&str> {
        todos.iter().map(Todo::text).collect()
    }

    #[test]
    fn append_keeps_insertion_order() {
        let todos = append(&TodoCollection::new(), Todo::restore("a", "first", false));
        let todos = append(&todos, Todo::restore("b", "second", false));
        assert_eq!(texts(&todos), ["first", "second"]);
    }

    #[test]
    fn toggle_flips_only_the_target() {
        let todos = sample();
        let result = toggle(&todos, &"1".into());

        assert!(result.get(&"1".into()).unwrap().completed());
        assert!(result.get(&"2".into()).unwrap().completed());
        assert!(!result.get(&"3".into()).unwrap().completed());
        // input untouched
        assert!(!todos.get(&"1".into()).unwrap().completed());
    }

    #[test]
    fn toggle_shares_untouched_entries() {
        let todos = sample();
        let result = toggle(&todos, &"2".into());

        assert!(!Arc::ptr_eq(&todos.entries()[1], &result.entries()[1]));
        for index in [0, 2, 3] {
            assert!(Arc::ptr_eq(&todos.entries()[index], &result.entries()[index]));
        }
    }

    #[test]
    fn toggle_twice_is_identity() {
        let todos = sample();
        let id = TodoId::from("3");
        assert_eq!(toggle(&toggle(&todos, &id), &id), todos);
    }

    #[test]
    fn toggle_unknown_id_is_noop() {
        let todos = sample();
        assert_eq!(toggle(&todos, &"nonexistent".into()), todos);
    }

    #[test]
    fn remove_drops_one_entry() {
        let todos = sample();
        let result = remove(&todos, &"2".into());
        assert_eq!(result.len(), 3);
        assert!(!result.contains(&"2".into()));
        assert_eq!(texts(&result), ["Todo 1", "Todo 3", "Todo 4"]);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let todos = sample();
        let result = remove(&todos, &"999".into());
        assert_eq!(result, todos);
    }

    #[test]
    fn filter_pending() {
        let result = filter_by_completion(&sample(), false);
        assert_eq!(texts(&result), ["Todo 1", "Todo 3"]);
        assert!(result.iter().all(|todo| !todo.completed()));
    }

    #[test]
    fn filter_completed() {
        let result = filter_by_completion(&sample(), true);
        assert_eq!(texts(&result), ["Todo 2", "Todo 4"]);
    }

    #[test]
    fn filter_empty() {
        assert!(filter_by_completion(&TodoCollection::new(), true).is_empty());
    }
}
