//! The todo record and its creation rules.
//!
//! A [`Todo`] is immutable once built: toggling produces a new record with
//! the same `id` and `text`. Validation happens exactly once, in
//! [`create_todo`]; records read back from storage are trusted as-is.

use crate::environment::IdGenerator;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a todo from user input
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    /// The text was empty or only whitespace
    #[error("todo text cannot be empty")]
    EmptyText,
}

/// Unique identifier for a todo item
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TodoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single todo item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    id: TodoId,
    text: String,
    completed: bool,
}

impl Todo {
    /// Rebuilds a record that was already validated, e.g. when reading
    /// fixtures or migrating data. User input goes through [`create_todo`].
    #[must_use]
    pub fn restore(id: impl Into<TodoId>, text: impl Into<String>, completed: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed,
        }
    }

    /// Identifier, fixed at creation
    #[must_use]
    pub const fn id(&self) -> &TodoId {
        &self.id
    }

    /// Trimmed description, fixed at creation
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the task is done
    #[must_use]
    pub const fn completed(&self) -> bool {
        self.completed
    }

    /// Copy of this record with `completed` flipped
    #[must_use]
    pub fn toggled(&self) -> Self {
        Self {
            id: self.id.clone(),
            text: self.text.clone(),
            completed: !self.completed,
        }
    }
}

/// Builds a new, pending todo from raw user input.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyText`] when `text` is blank after trimming.
pub fn create_todo(text: &str, ids: &dyn IdGenerator) -> Result<Todo, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }

    Ok(Todo {
        id: TodoId(ids.next_id()),
        text: text.to_string(),
        completed: false,
    })
}
