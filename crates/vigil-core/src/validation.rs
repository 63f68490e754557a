//! # Validation Module
//!
//! Input checks that run before any radio or network activity.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Wizard / Wi-Fi screen (out of scope)                         │
//! │  └── Keyboard limits, immediate feedback                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Credential slot sizes (32 / 64 bytes)                             │
//! │  └── Reserved record delimiter                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Settings store / queue file                                  │
//! │  └── Stores whatever passed layer 2                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::record::{IncidentRecord, RECORD_DELIMITER};
use crate::{MAX_PASSWORD_LEN, MAX_SSID_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Generic Validators
// =============================================================================

/// Fails when `value` is empty.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Fails when `value` is longer than `max` bytes (not characters).
pub fn validate_max_bytes(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Credential Validators
// =============================================================================

/// Validates a network SSID.
///
/// ## Rules
/// - Must not be empty
/// - At most 32 bytes
///
/// ## Example
/// ```rust
/// use vigil_core::validation::validate_ssid;
///
/// assert!(validate_ssid("StoreFloor").is_ok());
/// assert!(validate_ssid("").is_err());
/// ```
pub fn validate_ssid(ssid: &str) -> ValidationResult<()> {
    validate_required("ssid", ssid)?;
    validate_max_bytes("ssid", ssid, MAX_SSID_LEN)
}

/// Validates a network password.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 bytes
pub fn validate_password(password: &str) -> ValidationResult<()> {
    validate_required("password", password)?;
    validate_max_bytes("password", password, MAX_PASSWORD_LEN)
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates that an incident record survives the delimited encoding.
///
/// Every text field except `notes` (the last field) must be free of the
/// record delimiter, otherwise decoding would shift fields.
pub fn validate_record(record: &IncidentRecord) -> ValidationResult<()> {
    let fields = [
        ("shirt_color", record.shirt.name.as_str()),
        ("pants_color", record.pants.name.as_str()),
        ("shoes_color", record.shoes.name.as_str()),
        ("item_description", record.item_description.as_str()),
    ];

    for (field, value) in fields {
        if value.contains(RECORD_DELIMITER) {
            return Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: format!("must not contain '{}'", RECORD_DELIMITER),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
