//! # Sync Error Types
//!
//! Error types for connectivity, delivery and sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Connectivity   │  │       Remote            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Radio          │  │  HttpStatus             │ │
//! │  │  MissingUrl     │  │  Timeout        │  │  Transport              │ │
//! │  │  InvalidUrl     │  │                 │  │  Serialization          │ │
//! │  │  InvalidCred.   │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Exhaustion    │  │    Storage      │                              │
//! │  │                 │  │                 │                              │
//! │  │  RetriesExceeded│  │  Storage        │                              │
//! │  │                 │  │  InvalidRecord  │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Configuration errors are raised synchronously, before any I/O.       │
//! │  Everything else degrades to "try later" plus a log line.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type covering every failure in this crate.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A target URL is required but none is configured.
    #[error("No {0} URL configured")]
    MissingUrl(&'static str),

    /// URL failed to parse or uses an unsupported scheme.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Empty or over-length SSID/password.
    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] vigil_core::ValidationError),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Connectivity Errors
    // =========================================================================
    /// The radio adapter reported a failure.
    #[error("Radio error: {0}")]
    Radio(String),

    /// An HTTP request got no answer within the transport timeout.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Exhaustion Errors
    // =========================================================================
    /// Retry ceiling reached; the work was dropped.
    #[error("Gave up after {attempts} attempts")]
    RetriesExceeded { attempts: u32 },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Settings or queue persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] vigil_store::StoreError),

    /// A record could not be encoded or decoded.
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] vigil_core::CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the operation may succeed if tried again later.
    ///
    /// Remote errors count as retryable: a 5xx and a dropped link are
    /// handled the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Radio(_)
                | SyncError::Timeout(_)
                | SyncError::HttpStatus { .. }
                | SyncError::Transport(_)
        )
    }

    /// Returns true if the caller must fix configuration or input.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingUrl(_)
                | SyncError::InvalidUrl(_)
                | SyncError::InvalidCredential(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SyncError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
