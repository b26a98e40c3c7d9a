//! Aggregate counts derived from a collection snapshot. Never stored.

use crate::collection::TodoCollection;
use serde::{Deserialize, Serialize};

/// Totals and completion percentage of a collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stats {
    /// Number of todos
    pub total: usize,
    /// Number of completed todos
    pub completed: usize,
    /// `total - completed`
    pub pending: usize,
    /// `round(completed / total * 100)`, or `0` for an empty collection
    pub completion_rate: u8,
}

impl Stats {
    /// One-line progress summary, `None` when there is nothing to summarize
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        (self.total > 0).then(|| format!("{} of {} tasks completed", self.completed, self.total))
    }
}

/// Computes [`Stats`] for a collection.
#[must_use]
pub fn compute_stats(todos: &TodoCollection) -> Stats {
    let total = todos.len();
    let completed = todos.iter().filter(|todo| todo.completed()).count();

    Stats {
        total,
        completed,
        pending: total - completed,
        completion_rate: completion_rate(completed, total),
    }
}

/// Integer form of `round(completed / total * 100)` with halves rounded up.
fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let rate = (completed * 200 + total) / (total * 2);
    u8::try_from(rate).unwrap_or(100)
}
