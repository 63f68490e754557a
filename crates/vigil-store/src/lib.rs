//! # vigil-store: Persistence Layer for Vigil
//!
//! Owns every byte Vigil keeps across power cycles: device settings
//! (including remembered networks) and the delivery queue file.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vigil Data Flow                                  │
//! │                                                                         │
//! │  ConnectionManager / DeliveryQueue (vigil-sync)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    vigil-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ SettingsStore │    │  Credential   │    │  QueueStore  │  │   │
//! │  │   │ (settings.rs) │◄───│  Repository   │    │  (JSON file) │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  settings.toml, offline_queue.json in the data directory               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`settings`] - Namespaced key/value settings (file and memory)
//! - [`repository`] - Remembered networks and the delivery queue
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_store::{CredentialRepository, FileSettings, JsonFileQueueStore, QueueStore};
//!
//! let settings = FileSettings::open(data_dir.join("settings.toml"));
//! let credentials = CredentialRepository::new(Box::new(settings), 5);
//! let remembered = credentials.load()?;
//!
//! let queue = JsonFileQueueStore::in_dir(&data_dir);
//! let items = queue.load()?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod repository;
pub mod settings;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use settings::{FileSettings, MemorySettings, SettingsStore};

pub use repository::credentials::{CredentialRepository, WIFI_NAMESPACE};
pub use repository::queue::{JsonFileQueueStore, MemoryQueueStore, QueueStore, QUEUE_FILE_NAME};

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes `content` to a sibling temp file, syncs it, then renames it over
/// `path` and syncs the directory.
///
/// A power loss leaves either the old file or the new one, never a torn one.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> StoreResult<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let mut file = File::create(tmp).map_err(|e| StoreError::io(tmp, e))?;
    file.write_all(content).map_err(|e| StoreError::io(tmp, e))?;
    file.sync_all().map_err(|e| StoreError::io(tmp, e))?;
    drop(file);

    fs::rename(tmp, path).map_err(|e| StoreError::io(path, e))?;
    sync_dir(parent.unwrap_or_else(|| Path::new(".")));
    Ok(())
}

/// Flushes the rename to disk. Directories cannot be opened for sync on
/// every platform, so failure here only costs durability of the rename.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(dir = %dir.display(), error = %e, "Directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomically_replaces_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("offline_queue.json");

        write_atomically(&path, b"{\"queue\":[1]}").unwrap();
        write_atomically(&path, b"{\"queue\":[]}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{\"queue\":[]}");
        assert!(!dir.path().join("nested").join("offline_queue.json.tmp").exists());
    }

    #[test]
    fn test_write_atomically_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let result = write_atomically(&blocker.join("settings.toml"), b"x");
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }
}
