//! # Error Types
//!
//! Domain-specific error types for vigil-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vigil-core errors (this file)                                         │
//! │  ├── CoreError        - Record codec failures                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  vigil-store errors (separate crate)                                   │
//! │  └── StoreError       - Settings / queue file failures                 │
//! │                                                                         │
//! │  vigil-sync errors (separate crate)                                    │
//! │  └── SyncError        - Config, connectivity, remote, exhaustion       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → status / log line     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while encoding or decoding incident records.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The delimited form did not contain the expected number of fields.
    ///
    /// ## When This Occurs
    /// - Queue file edited by hand or truncated mid-write
    /// - Payload produced by an older firmware with a different layout
    #[error("Malformed record: expected {expected} delimiters, found {found}")]
    MalformedRecord { expected: usize, found: usize },

    /// A field was present but could not be parsed.
    #[error("Invalid {field} value '{value}'")]
    InvalidField { field: &'static str, value: String },

    /// The wire payload could not be produced.
    #[error("Wire encoding failed: {0}")]
    WireEncoding(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::WireEncoding(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any I/O is attempted; the caller must fix the input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is longer than the storage slot allows.
    #[error("{field} must be at most {max} bytes")]
    TooLong { field: String, max: usize },

    /// Invalid format (reserved delimiter, bad URL, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
