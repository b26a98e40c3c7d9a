//! View configuration.
//!
//! Loads from environment variables with sensible defaults:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `TODO_SYNC_DATA_DIR` | platform data dir | Directory for [`FileStore`](crate::FileStore) |
//! | `TODO_SYNC_SLOT` | `todos` | Key the collection is stored under |
//! | `TODO_SYNC_ON_CORRUPT` | `empty` | `empty` or `error` for a malformed slot |

use std::env;
use std::path::PathBuf;
use thiserror::Error;
use todo_sync_core::storage::{CorruptSlotPolicy, DEFAULT_SLOT};

/// Directory for the file store
pub const DATA_DIR_VAR: &str = "TODO_SYNC_DATA_DIR";
/// Slot key
pub const SLOT_VAR: &str = "TODO_SYNC_SLOT";
/// Malformed slot handling
pub const ON_CORRUPT_VAR: &str = "TODO_SYNC_ON_CORRUPT";

/// Errors from reading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set to something that cannot be used
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Configuration for mounting a [`View`](crate::View)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Key the collection is stored under
    pub slot: String,
    /// Handling of a slot that holds malformed data
    pub on_corrupt: CorruptSlotPolicy,
    /// Directory for file-backed storage (`None` = platform default)
    pub data_dir: Option<PathBuf>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            slot: DEFAULT_SLOT.to_string(),
            on_corrupt: CorruptSlotPolicy::default(),
            data_dir: None,
        }
    }
}

impl ViewConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but blank
    /// or unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ViewConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(slot) = lookup(SLOT_VAR) {
            let slot = slot.trim();
            if slot.is_empty() {
                return Err(ConfigError::InvalidValue {
                    var: SLOT_VAR,
                    reason: "slot key cannot be empty".to_string(),
                });
            }
            config.slot = slot.to_string();
        }

        if let Some(policy) = lookup(ON_CORRUPT_VAR) {
            config.on_corrupt = policy
                .trim()
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    var: ON_CORRUPT_VAR,
                    reason,
                })?;
        }

        config.data_dir = lookup(DATA_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Use a different slot key
    #[must_use]
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    /// Use a different malformed-slot policy
    #[must_use]
    pub const fn with_corrupt_slot_policy(mut self, policy: CorruptSlotPolicy) -> Self {
        self.on_corrupt = policy;
        self
    }

    /// Store files in `dir`
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}
