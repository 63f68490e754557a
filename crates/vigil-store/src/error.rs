//! # Store Error Types
//!
//! Error types for settings and queue persistence.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io / serde_json / toml error                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds the path and operation                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError::Storage (vigil-sync) ← Logged, degraded to "try later"     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a file failed.
    ///
    /// ## When This Occurs
    /// - Flash full or read-only
    /// - Parent directory missing and cannot be created
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Data could not be serialized.
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Persisted data could not be parsed.
    ///
    /// ## When This Occurs
    /// - File truncated by a power loss during a non-atomic write
    /// - File edited by hand
    #[error("Decode failed: {0}")]
    Decode(String),

    /// A stored value has the wrong type for the requested key.
    #[error("Key {namespace}.{key} is not a {expected}")]
    TypeMismatch {
        namespace: String,
        key: String,
        expected: &'static str,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::Encode(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
