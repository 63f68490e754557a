//! # Incident Record
//!
//! The loss-prevention record produced by the wizard, and its two encodings.
//!
//! ## Encodings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        IncidentRecord Encodings                         │
//! │                                                                         │
//! │  DELIMITED (local storage, delivery queue payload)                     │
//! │  ─────────────────────────────────────────────────                     │
//! │  1700000000|1|Red|ff0000|Blue|ff|Black|0|2|Headphones|Left quickly     │
//! │  ts        g  shirt      pants    shoes   it desc       notes          │
//! │                                                                         │
//! │  • 11 fields, 10 delimiters                                            │
//! │  • RGB as lowercase hex, no padding                                    │
//! │  • notes is last and may contain '|'                                   │
//! │                                                                         │
//! │  WIRE (API / webhook body)                                             │
//! │  ─────────────────────────                                             │
//! │  { "timestamp": 1700000000, "gender": 1,                               │
//! │    "shirt_color": "Red", "shirt_rgb": "ff0000", ...                    │
//! │    "item_type": 2, "item_description": "...", "notes": "..." }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Field separator of the delimited encoding.
pub const RECORD_DELIMITER: char = '|';

/// Number of delimiters in a well-formed delimited record.
const DELIMITER_COUNT: usize = 10;

// =============================================================================
// Codes
// =============================================================================

/// Observed gender of the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unknown,
    Male,
    Female,
    Other,
}

impl Gender {
    /// Numeric code used by both encodings.
    pub const fn code(self) -> u8 {
        match self {
            Gender::Unknown => 0,
            Gender::Male => 1,
            Gender::Female => 2,
            Gender::Other => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Gender::Unknown),
            1 => Some(Gender::Male),
            2 => Some(Gender::Female),
            3 => Some(Gender::Other),
            _ => None,
        }
    }
}

/// Category of the item involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Unknown,
    Clothing,
    Electronics,
    Cosmetics,
    Accessories,
    Food,
    Other,
}

impl ItemType {
    /// Numeric code used by both encodings.
    pub const fn code(self) -> u8 {
        match self {
            ItemType::Unknown => 0,
            ItemType::Clothing => 1,
            ItemType::Electronics => 2,
            ItemType::Cosmetics => 3,
            ItemType::Accessories => 4,
            ItemType::Food => 5,
            ItemType::Other => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ItemType::Unknown),
            1 => Some(ItemType::Clothing),
            2 => Some(ItemType::Electronics),
            3 => Some(ItemType::Cosmetics),
            4 => Some(ItemType::Accessories),
            5 => Some(ItemType::Food),
            6 => Some(ItemType::Other),
            _ => None,
        }
    }
}

// =============================================================================
// Color
// =============================================================================

/// A named clothing colour with its 24-bit RGB swatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub name: String,
    pub rgb: u32,
}

impl Color {
    pub fn new(name: impl Into<String>, rgb: u32) -> Self {
        Color {
            name: name.into(),
            rgb,
        }
    }

    /// RGB as lowercase hex without zero padding (`0x0000ff` → `"ff"`).
    pub fn rgb_hex(&self) -> String {
        format!("{:x}", self.rgb)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::new("Unknown", 0)
    }
}

// =============================================================================
// Incident Record
// =============================================================================

/// One completed wizard run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Unix seconds from the device RTC.
    pub timestamp: i64,
    pub gender: Gender,
    pub shirt: Color,
    pub pants: Color,
    pub shoes: Color,
    pub item_type: ItemType,
    pub item_description: String,
    pub notes: String,
}

/// Borrowed view serialized as the wire payload.
#[derive(Serialize)]
struct WireRecord<'a> {
    timestamp: i64,
    gender: u8,
    shirt_color: &'a str,
    shirt_rgb: String,
    pants_color: &'a str,
    pants_rgb: String,
    shoes_color: &'a str,
    shoes_rgb: String,
    item_type: u8,
    item_description: &'a str,
    notes: &'a str,
}

impl IncidentRecord {
    /// Creates an empty record stamped with `timestamp`.
    pub fn new(timestamp: i64) -> Self {
        IncidentRecord {
            timestamp,
            gender: Gender::Unknown,
            shirt: Color::default(),
            pants: Color::default(),
            shoes: Color::default(),
            item_type: ItemType::Unknown,
            item_description: String::new(),
            notes: String::new(),
        }
    }

    /// Encodes the record in the delimited form.
    pub fn to_delimited(&self) -> String {
        let fields = [
            self.timestamp.to_string(),
            self.gender.code().to_string(),
            self.shirt.name.clone(),
            self.shirt.rgb_hex(),
            self.pants.name.clone(),
            self.pants.rgb_hex(),
            self.shoes.name.clone(),
            self.shoes.rgb_hex(),
            self.item_type.code().to_string(),
            self.item_description.clone(),
            self.notes.clone(),
        ];
        fields.join("|")
    }

    /// Decodes the delimited form.
    ///
    /// Splits on the first ten delimiters; everything after the tenth is the
    /// notes field verbatim.
    pub fn from_delimited(data: &str) -> CoreResult<Self> {
        let fields: Vec<&str> = data.splitn(DELIMITER_COUNT + 1, RECORD_DELIMITER).collect();
        if fields.len() != DELIMITER_COUNT + 1 {
            return Err(CoreError::MalformedRecord {
                expected: DELIMITER_COUNT,
                found: fields.len().saturating_sub(1),
            });
        }

        let gender_code: u8 = parse_field("gender", fields[1])?;
        let item_code: u8 = parse_field("item_type", fields[8])?;

        Ok(IncidentRecord {
            timestamp: parse_field("timestamp", fields[0])?,
            gender: Gender::from_code(gender_code).ok_or_else(|| CoreError::InvalidField {
                field: "gender",
                value: fields[1].to_string(),
            })?,
            shirt: Color::new(fields[2], parse_rgb("shirt_rgb", fields[3])?),
            pants: Color::new(fields[4], parse_rgb("pants_rgb", fields[5])?),
            shoes: Color::new(fields[6], parse_rgb("shoes_rgb", fields[7])?),
            item_type: ItemType::from_code(item_code).ok_or_else(|| CoreError::InvalidField {
                field: "item_type",
                value: fields[8].to_string(),
            })?,
            item_description: fields[9].to_string(),
            notes: fields[10].to_string(),
        })
    }

    /// Encodes the record as the JSON body sent to the API or a webhook.
    pub fn to_wire_json(&self) -> CoreResult<String> {
        let wire = WireRecord {
            timestamp: self.timestamp,
            gender: self.gender.code(),
            shirt_color: &self.shirt.name,
            shirt_rgb: self.shirt.rgb_hex(),
            pants_color: &self.pants.name,
            pants_rgb: self.pants.rgb_hex(),
            shoes_color: &self.shoes.name,
            shoes_rgb: self.shoes.rgb_hex(),
            item_type: self.item_type.code(),
            item_description: &self.item_description,
            notes: &self.notes,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// One-line summary for log output.
    pub fn summary(&self) -> String {
        format!(
            "{:?} {:?} at {}",
            self.gender, self.item_type, self.timestamp
        )
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> CoreResult<T> {
    value.trim().parse().map_err(|_| CoreError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_rgb(field: &'static str, value: &str) -> CoreResult<u32> {
    u32::from_str_radix(value.trim(), 16).map_err(|_| CoreError::InvalidField {
        field,
        value: value.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IncidentRecord {
        IncidentRecord {
            timestamp: 1_700_000_000,
            gender: Gender::Female,
            shirt: Color::new("Red", 0xff0000),
            pants: Color::new("Navy", 0x0000ff),
            shoes: Color::new("Black", 0),
            item_type: ItemType::Electronics,
            item_description: "Headphones".to_string(),
            notes: "Left via east exit".to_string(),
        }
    }

    #[test]
    fn test_delimited_layout() {
        assert_eq!(
            sample().to_delimited(),
            "1700000000|2|Red|ff0000|Navy|ff|Black|0|2|Headphones|Left via east exit"
        );
    }

    #[test]
    fn test_summary_names_kind_and_time() {
        assert_eq!(sample().summary(), "Female Electronics at 1700000000");
    }

    #[test]
    fn test_delimited_decode_preserves_fields() {
        let decoded = IncidentRecord::from_delimited(&sample().to_delimited()).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_notes_may_contain_delimiter() {
        let mut record = sample();
        record.notes = "a|b|c".to_string();
        let decoded = IncidentRecord::from_delimited(&record.to_delimited()).unwrap();
        assert_eq!(decoded.notes, "a|b|c");
    }

    #[test]
    fn test_malformed_record() {
        let err = IncidentRecord::from_delimited("1700000000|2|Red").unwrap_err();
        assert!(matches!(
            err,
            CoreError::MalformedRecord {
                expected: 10,
                found: 2
            }
        ));
    }

    #[test]
    fn test_unknown_codes_rejected() {
        let err = IncidentRecord::from_delimited("1|9|a|0|b|0|c|0|1|d|e").unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { field: "gender", .. }));

        let err = IncidentRecord::from_delimited("1|1|a|zz|b|0|c|0|1|d|e").unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { field: "shirt_rgb", .. }));
    }

    #[test]
    fn test_wire_json_fields() {
        let json = sample().to_wire_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["timestamp"], 1_700_000_000);
        assert_eq!(value["gender"], 2);
        assert_eq!(value["shirt_color"], "Red");
        assert_eq!(value["pants_rgb"], "ff");
        assert_eq!(value["item_type"], 2);
        assert_eq!(value["notes"], "Left via east exit");
    }

    #[test]
    fn test_wire_json_escapes_quotes() {
        let mut record = sample();
        record.item_description = "12\" monitor".to_string();
        let json = record.to_wire_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["item_description"], "12\" monitor");
    }
}
