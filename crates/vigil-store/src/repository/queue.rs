//! # Delivery Queue Store
//!
//! Whole-file persistence for the delivery queue.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  offline_queue.json                                                     │
//! │                                                                         │
//! │  {                                                                      │
//! │    "queue": [                                                           │
//! │      { "kind": "record_sync", "payload": "1700000000|1|...",           │
//! │        "timestamp": "2026-01-01T12:00:00Z", "retry_count": 0 },        │
//! │      { "kind": "webhook", "payload": "{...}",                          │
//! │        "target": "https://hooks.example/x",                            │
//! │        "timestamp": "2026-01-01T12:00:05Z", "retry_count": 3 }         │
//! │    ]                                                                    │
//! │  }                                                                      │
//! │                                                                         │
//! │  save(): serialize everything → temp file → rename over the original   │
//! │  load(): missing file = empty queue                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no incremental log. Every mutation rewrites the full document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use vigil_core::QueueItem;

use crate::error::{StoreError, StoreResult};
use crate::write_atomically;

/// Default file name for the delivery queue.
pub const QUEUE_FILE_NAME: &str = "offline_queue.json";

// =============================================================================
// Trait
// =============================================================================

/// Durable storage for the ordered delivery queue.
pub trait QueueStore: Send {
    /// Loads the persisted queue in order.
    fn load(&self) -> StoreResult<Vec<QueueItem>>;

    /// Replaces the persisted queue with `items`.
    fn save(&mut self, items: &[QueueItem]) -> StoreResult<()>;
}

#[derive(Serialize)]
struct QueueDocumentRef<'a> {
    queue: &'a [QueueItem],
}

#[derive(Deserialize)]
struct QueueDocument {
    #[serde(default)]
    queue: Vec<QueueItem>,
}

// =============================================================================
// JSON File Store
// =============================================================================

/// Stores the queue as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileQueueStore {
    path: PathBuf,
}

impl JsonFileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileQueueStore { path: path.into() }
    }

    /// Store at `<dir>/offline_queue.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(QUEUE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueStore for JsonFileQueueStore {
    fn load(&self) -> StoreResult<Vec<QueueItem>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No queue file, starting empty");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let document: QueueDocument =
            serde_json::from_str(&content).map_err(|e| StoreError::Decode(e.to_string()))?;

        debug!(path = %self.path.display(), count = document.queue.len(), "Queue loaded");
        Ok(document.queue)
    }

    fn save(&mut self, items: &[QueueItem]) -> StoreResult<()> {
        let content = serde_json::to_vec(&QueueDocumentRef { queue: items })
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        write_atomically(&self.path, &content)?;

        debug!(path = %self.path.display(), count = items.len(), "Queue saved");
        Ok(())
    }
}

// =============================================================================
// Memory Store
// =============================================================================

#[derive(Debug, Default)]
struct MemoryQueueState {
    items: Vec<QueueItem>,
    saves: usize,
}

/// In-memory queue store for host runs and tests.
///
/// Clones share state; [`save_count`](Self::save_count) reports how many
/// times the owner persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStore {
    inner: Arc<Mutex<MemoryQueueState>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the persisted items.
    pub fn items(&self) -> Vec<QueueItem> {
        self.lock().items.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> MutexGuard<'_, MemoryQueueState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self) -> StoreResult<Vec<QueueItem>> {
        Ok(self.lock().items.clone())
    }

    fn save(&mut self, items: &[QueueItem]) -> StoreResult<()> {
        let mut state = self.lock();
        state.items = items.to_vec();
        state.saves += 1;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
