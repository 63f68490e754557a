//! # vigil-core: Pure Domain Types for Vigil
//!
//! Types and rules shared by the storage and sync layers. Nothing in this
//! crate touches the radio, the network or the file system.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Vigil Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Wizard / screens (external collaborator)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ IncidentRecord                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   vigil-sync: ConnectionManager, DeliveryQueue, SyncCoordinator │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vigil-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐ │   │
//! │  │   │  record   │  │ credential │  │  outbox   │  │ validation│ │   │
//! │  │   │ Incident  │  │ Remembered │  │ QueueItem │  │   rules   │ │   │
//! │  │   │  codecs   │  │  Networks  │  │ Delivery  │  │           │ │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘  └───────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO RADIO • NO NETWORK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`record`] - Incident record with its delimited and wire encodings
//! - [`credential`] - Network credentials and the remembered-network list
//! - [`outbox`] - Delivery queue items
//! - [`validation`] - Input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use vigil_core::record::{IncidentRecord, ItemType};
//!
//! let mut record = IncidentRecord::new(1_700_000_000);
//! record.item_type = ItemType::Cosmetics;
//!
//! let stored = record.to_delimited();
//! let decoded = IncidentRecord::from_delimited(&stored).unwrap();
//! assert_eq!(decoded.item_type, ItemType::Cosmetics);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credential;
pub mod error;
pub mod outbox;
pub mod record;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use credential::{NetworkCredential, RememberedNetworks, UpsertOutcome};
pub use error::{CoreError, CoreResult, ValidationError};
pub use outbox::{Delivery, DeliveryKind, QueueItem};
pub use record::{Color, Gender, IncidentRecord, ItemType};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest SSID the settings slot holds, in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Largest password the settings slot holds, in bytes.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Remembered networks kept when no limit is configured.
pub const DEFAULT_MAX_REMEMBERED: usize = 5;

/// Firmware version reported in the `User-Agent` header.
pub const APP_VERSION: &str = "2.0.0";
