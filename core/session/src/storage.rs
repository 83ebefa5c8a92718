//! Durable client storage for the session pointer and snapshot.
//!
//! Browser clients back this with `localStorage`; the file-backed
//! implementation here serves native hosts, tests, and the `session-check`
//! diagnostic. Exactly two records live in storage: the active-session
//! pointer (identifier + owner + lease) and one full-session snapshot blob.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "gymiq.active_session": "{ ... SessionPointer ... }",
//!     "gymiq.session_snapshot": "{ ... WorkoutSession ... }"
//!   }
//! }
//! ```
//!
//! # Defensive Design
//!
//! Storage is best-effort durability, never a source of truth:
//! - Empty files load as an empty store
//! - Corrupt JSON loads as an empty store (warning logged)
//! - Unsupported versions load as an empty store
//! - Corrupt pointer/snapshot values decode to `None`
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write never leaves a torn file.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use gymiq_model::WorkoutSession;

/// Storage key for the active-session pointer.
pub const POINTER_KEY: &str = "gymiq.active_session";

/// Storage key for the local full-session snapshot blob.
pub const SNAPSHOT_KEY: &str = "gymiq.session_snapshot";

/// Pointers older than this are discarded without a remote fetch.
pub const POINTER_STALE_DAYS: i64 = 7;

const STORE_VERSION: u32 = 1;

/// Key/value durable client storage: synchronous, string values only,
/// scoped per profile (not per tab).
pub trait DurableStorage {
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value. Fails only on quota exhaustion or I/O errors; callers
    /// treat failure as "keep going in memory only".
    fn set(&mut self, key: &str, value: &str) -> Result<(), String>;

    fn remove(&mut self, key: &str);
}

/// The small durable record that lets a reloaded client find its
/// in-progress workout again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPointer {
    pub session_id: String,
    pub user_id: String,
    /// Random per-tab token; the auto-save bridge refuses to write when the
    /// stored token no longer matches its own.
    pub lease_token: String,
    pub saved_at: DateTime<Utc>,
}

impl SessionPointer {
    /// True once the pointer is old enough that resurrecting the workout
    /// would be more confusing than helpful.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.saved_at) > Duration::days(POINTER_STALE_DAYS)
    }
}

/// Reads the active-session pointer, if a decodable one exists.
pub fn load_pointer(storage: &dyn DurableStorage) -> Option<SessionPointer> {
    let raw = storage.get(POINTER_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(pointer) => Some(pointer),
        Err(err) => {
            warn!(error = %err, "Corrupt session pointer in storage, ignoring");
            None
        }
    }
}

/// Writes the active-session pointer. Best-effort: a quota failure is
/// reported to the caller but the session stays usable in memory.
pub fn save_pointer(storage: &mut dyn DurableStorage, pointer: &SessionPointer) -> Result<(), String> {
    let raw = serde_json::to_string(pointer)
        .map_err(|err| format!("Failed to serialize session pointer: {}", err))?;
    storage.set(POINTER_KEY, &raw)
}

/// Reads the local session snapshot, if a decodable one exists.
pub fn load_snapshot(storage: &dyn DurableStorage) -> Option<WorkoutSession> {
    let raw = storage.get(SNAPSHOT_KEY)?;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(err) => {
            warn!(error = %err, "Corrupt session snapshot in storage, ignoring");
            None
        }
    }
}

/// Mirrors the full session into storage. Best-effort, same as the pointer.
pub fn save_snapshot(storage: &mut dyn DurableStorage, session: &WorkoutSession) -> Result<(), String> {
    let raw = serde_json::to_string(session)
        .map_err(|err| format!("Failed to serialize session snapshot: {}", err))?;
    storage.set(SNAPSHOT_KEY, &raw)
}

/// Removes both the pointer and the snapshot blob.
///
/// Discard always deletes both, so a dangling snapshot can never survive
/// into an unrelated future session.
pub fn clear_session_artifacts(storage: &mut dyn DurableStorage) {
    storage.remove(POINTER_KEY);
    storage.remove(SNAPSHOT_KEY);
    debug!("Cleared session pointer and snapshot");
}

/// Filesystem locations for GymIQ client state.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gymiq");
        StorageConfig { base_dir }
    }
}

impl StorageConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        StorageConfig {
            base_dir: base_dir.into(),
        }
    }

    /// Path of the durable session-state file.
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join("session-state.json")
    }
}

/// The on-disk JSON structure for the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    /// Schema version. We only load files with version == 1.
    version: u32,
    entries: HashMap<String, String>,
}

impl Default for StoreFile {
    fn default() -> Self {
        StoreFile {
            version: STORE_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// File-backed [`DurableStorage`] with atomic writes.
pub struct FileStorage {
    entries: HashMap<String, String>,
    file_path: PathBuf,
}

impl FileStorage {
    /// Loads storage from `file_path`, degrading to an empty store on any
    /// defect in the file.
    pub fn load(file_path: &Path) -> FileStorage {
        let empty = FileStorage {
            entries: HashMap::new(),
            file_path: file_path.to_path_buf(),
        };

        if !file_path.exists() {
            return empty;
        }

        let content = match fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "Failed to read state file, starting empty");
                return empty;
            }
        };

        if content.trim().is_empty() {
            warn!("Empty state file, starting empty");
            return empty;
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(store_file) if store_file.version == STORE_VERSION => FileStorage {
                entries: store_file.entries,
                file_path: file_path.to_path_buf(),
            },
            Ok(store_file) => {
                warn!(
                    version = store_file.version,
                    expected = STORE_VERSION,
                    "Unsupported state file version, starting empty"
                );
                empty
            }
            Err(err) => {
                warn!(error = %err, "Failed to parse state file, starting empty");
                empty
            }
        }
    }

    fn persist(&self) -> Result<(), String> {
        let store_file = StoreFile {
            version: STORE_VERSION,
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&store_file)
            .map_err(|err| format!("Failed to serialize state file: {}", err))?;

        let parent_dir = self
            .file_path
            .parent()
            .ok_or_else(|| "State file path has no parent directory".to_string())?;
        fs::create_dir_all(parent_dir)
            .map_err(|err| format!("Failed to create state dir: {}", err))?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|err| format!("Temp file error: {}", err))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| format!("Failed to write temp state file: {}", err))?;
        temp_file
            .flush()
            .map_err(|err| format!("Failed to flush temp state file: {}", err))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|err| format!("Failed to commit state file: {}", err.error))?;
        Ok(())
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            if let Err(err) = self.persist() {
                warn!(error = %err, "Failed to persist removal from state file");
            }
        }
    }
}
