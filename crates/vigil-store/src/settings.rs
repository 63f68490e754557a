//! # Settings Store
//!
//! Namespaced key/value storage for small device settings.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         settings.toml                                   │
//! │                                                                         │
//! │   [wifi]                  ◄── one table per namespace                  │
//! │   count = 2                                                             │
//! │   ssid0 = "Backroom"                                                    │
//! │   pwd0  = "********"                                                    │
//! │   ssid1 = "SalesFloor"                                                  │
//! │   pwd1  = "********"                                                    │
//! │                                                                         │
//! │   Every put rewrites the file (temp file, then rename).                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use toml::{Table, Value};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::write_atomically;

// =============================================================================
// Trait
// =============================================================================

/// Namespaced get/put for strings and integers.
pub trait SettingsStore: Send {
    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<Option<String>>;

    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> StoreResult<()>;

    fn get_int(&self, namespace: &str, key: &str) -> StoreResult<Option<i64>>;

    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> StoreResult<()>;

    /// Removes a key. Missing keys are not an error.
    fn remove(&mut self, namespace: &str, key: &str) -> StoreResult<()>;
}

// =============================================================================
// File Store
// =============================================================================

/// TOML-file-backed settings.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    tables: Table,
}

impl FileSettings {
    /// Opens the settings file, starting empty when it is missing or corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tables = match Self::read(&path) {
            Ok(tables) => tables,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Settings unreadable, starting empty");
                Table::new()
            }
        };
        debug!(path = %path.display(), namespaces = tables.len(), "Settings opened");
        FileSettings { path, tables }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> StoreResult<Table> {
        if !path.exists() {
            return Ok(Table::new());
        }
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Ok(content.parse::<Table>()?)
    }

    fn flush(&self) -> StoreResult<()> {
        let content = toml::to_string_pretty(&self.tables)?;
        write_atomically(&self.path, content.as_bytes())
    }

    fn value(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.tables
            .get(namespace)
            .and_then(Value::as_table)
            .and_then(|table| table.get(key))
    }

    fn set(&mut self, namespace: &str, key: &str, value: Value) -> StoreResult<()> {
        let entry = self
            .tables
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Table(Table::new()));

        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        if let Value::Table(table) = entry {
            table.insert(key.to_string(), value);
        }
        self.flush()
    }
}

impl SettingsStore for FileSettings {
    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<Option<String>> {
        match self.value(namespace, key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(mismatch(namespace, key, "string")),
        }
    }

    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        self.set(namespace, key, Value::String(value.to_string()))
    }

    fn get_int(&self, namespace: &str, key: &str) -> StoreResult<Option<i64>> {
        match self.value(namespace, key) {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(_) => Err(mismatch(namespace, key, "integer")),
        }
    }

    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> StoreResult<()> {
        self.set(namespace, key, Value::Integer(value))
    }

    fn remove(&mut self, namespace: &str, key: &str) -> StoreResult<()> {
        let removed = self
            .tables
            .get_mut(namespace)
            .and_then(Value::as_table_mut)
            .and_then(|table| table.remove(key))
            .is_some();

        if removed {
            self.flush()?;
        }
        Ok(())
    }
}

fn mismatch(namespace: &str, key: &str, expected: &'static str) -> StoreError {
    StoreError::TypeMismatch {
        namespace: namespace.to_string(),
        key: key.to_string(),
        expected,
    }
}

// =============================================================================
// Memory Store
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Setting {
    Text(String),
    Int(i64),
}

/// In-memory settings for host runs and tests.
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the owner wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    inner: Arc<Mutex<HashMap<(String, String), Setting>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys across all namespaces.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), Setting>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(namespace: &str, key: &str) -> (String, String) {
        (namespace.to_string(), key.to_string())
    }
}

impl SettingsStore for MemorySettings {
    fn get_string(&self, namespace: &str, key: &str) -> StoreResult<Option<String>> {
        match self.lock().get(&Self::key(namespace, key)) {
            None => Ok(None),
            Some(Setting::Text(s)) => Ok(Some(s.clone())),
            Some(Setting::Int(_)) => Err(mismatch(namespace, key, "string")),
        }
    }

    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> StoreResult<()> {
        self.lock()
            .insert(Self::key(namespace, key), Setting::Text(value.to_string()));
        Ok(())
    }

    fn get_int(&self, namespace: &str, key: &str) -> StoreResult<Option<i64>> {
        match self.lock().get(&Self::key(namespace, key)) {
            None => Ok(None),
            Some(Setting::Int(i)) => Ok(Some(*i)),
            Some(Setting::Text(_)) => Err(mismatch(namespace, key, "integer")),
        }
    }

    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> StoreResult<()> {
        self.lock().insert(Self::key(namespace, key), Setting::Int(value));
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> StoreResult<()> {
        self.lock().remove(&Self::key(namespace, key));
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
