//! Directory-backed [`KeyValueStore`].
//!
//! Every key is one `{key}.json` file in the store directory. Writes go to a
//! hidden temporary file first and are renamed into place, so readers never
//! observe a half-written value. A filesystem watcher on the directory turns
//! changes (from this process or any other) into [`StorageEvent`]s.
//!
//! Several processes pointed at the same directory behave like several
//! browser tabs sharing local storage: each sees the others' writes through
//! its notifications.

use directories::ProjectDirs;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use todo_sync_core::storage::{KeyValueStore, Origin, StorageError, StorageEvent};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;
const EXTENSION: &str = "json";

/// Writes made through this handle that the watcher has not reported yet,
/// per key and oldest first (`None` = removal).
#[derive(Debug, Default)]
struct PendingWrites(HashMap<String, VecDeque<Option<String>>>);

impl PendingWrites {
    fn push(&mut self, key: &str, value: Option<&str>) {
        self.0
            .entry(key.to_string())
            .or_default()
            .push_back(value.map(str::to_string));
    }

    /// Drops the most recent write for `key` (it never reached the disk)
    fn retract(&mut self, key: &str) {
        if let Some(queue) = self.0.get_mut(key) {
            queue.pop_back();
            if queue.is_empty() {
                self.0.remove(key);
            }
        }
    }

    /// Whether `observed` is one of our pending writes for `key`.
    ///
    /// A match consumes that write and every older one (the filesystem may
    /// coalesce events). Any other value was written by someone else and
    /// clears the key, so identical content written later by another handle
    /// is never mistaken for ours.
    fn claim(&mut self, key: &str, observed: Option<&str>) -> bool {
        let Some(queue) = self.0.get_mut(key) else {
            return false;
        };
        if let Some(position) = queue.iter().position(|v| v.as_deref() == observed) {
            queue.drain(..=position);
            if queue.is_empty() {
                self.0.remove(key);
            }
            true
        } else {
            self.0.remove(key);
            false
        }
    }
}

type SharedPending = Arc<Mutex<PendingWrites>>;

/// Key-value store over a directory of JSON files
pub struct FileStore {
    dir: PathBuf,
    origin: Origin,
    events: broadcast::Sender<StorageEvent>,
    pending: SharedPending,
    _watcher: RecommendedWatcher,
}

impl FileStore {
    /// Opens (creating if needed) a store in `dir` and starts watching it.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Io`] if the directory cannot be created
    /// - [`StorageError::Unavailable`] if the watcher cannot be started
    #[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, &e))?;

        let origin = Origin::next_handle();
        let events = broadcast::channel(CHANNEL_CAPACITY).0;
        let pending = SharedPending::default();
        let watcher = start_watch(&dir, origin, events.clone(), Arc::clone(&pending))?;

        tracing::debug!(?origin, "Opened file store");
        Ok(Self {
            dir,
            origin,
            events,
            pending,
            _watcher: watcher,
        })
    }

    /// Platform data directory for todo-sync, if the platform has one
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "todo-sync", "todo-sync").map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Directory this store reads and writes
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    fn expect_write(&self, key: &str, value: Option<&str>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(key, value);
        }
    }

    fn retract_write(&self, key: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retract(key);
        }
    }
}

impl KeyValueStore for FileStore {
    fn origin(&self) -> Origin {
        self.origin
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, &e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.{EXTENSION}.tmp"));

        fs::write(&tmp, value).map_err(|e| io_error(&tmp, &e))?;

        // Recorded before the rename so the watcher can attribute the event
        self.expect_write(key, Some(value));
        if let Err(e) = fs::rename(&tmp, &path) {
            self.retract_write(key);
            return Err(io_error(&path, &e));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        self.expect_write(key, None);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Nothing changed on disk, so no event will come
                self.retract_write(key);
                if e.kind() == io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(io_error(&path, &e))
                }
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

fn start_watch(
    dir: &Path,
    origin: Origin,
    events: broadcast::Sender<StorageEvent>,
    pending: SharedPending,
) -> Result<RecommendedWatcher, StorageError> {
    // Filesystems report one change as several events; only forward values
    // that differ from the last one seen for the key.
    let mut last_seen: HashMap<String, Option<String>> = HashMap::new();

    let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
        let event = match res {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(%error, "File watcher error");
                return;
            }
        };

        for path in &event.paths {
            let Some(key) = key_for_path(path) else {
                continue;
            };
            let value = fs::read_to_string(path).ok();
            if last_seen.get(&key) == Some(&value) {
                continue;
            }
            last_seen.insert(key.clone(), value.clone());

            let own = pending
                .lock()
                .is_ok_and(|mut pending| pending.claim(&key, value.as_deref()));
            let origin = if own { origin } else { Origin::External };

            tracing::trace!(%key, ?origin, "Storage file changed");
            // No receivers is fine: nobody is watching yet
            let _ = events.send(StorageEvent {
                key,
                new_value: value,
                origin,
            });
        }
    })
    .map_err(|e| StorageError::Unavailable(format!("cannot create watcher: {e}")))?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| StorageError::Unavailable(format!("cannot watch {}: {e}", dir.display())))?;

    Ok(watcher)
}

/// Keys become file names, so only a conservative character set is allowed.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Key stored at `path`, or `None` for temporary and unrelated files
fn key_for_path(path: &Path) -> Option<String> {
    if path.extension()? != EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    validate_key(stem).ok()?;
    Some(stem.to_string())
}

fn io_error(path: &Path, error: &io::Error) -> StorageError {
    StorageError::Io(format!("{}: {error}", path.display()))
}
