//! # Outbound Queue Items
//!
//! The units of work held by the delivery queue.
//!
//! ## Item Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          QueueItem Lifecycle                            │
//! │                                                                         │
//! │   enqueue ──► [retry_count = 0]                                        │
//! │                    │                                                    │
//! │                    ▼ drain pass                                         │
//! │              ┌───────────┐  success   ┌──────────┐                     │
//! │              │  attempt  │───────────►│ removed  │ (delivered)         │
//! │              └─────┬─────┘            └──────────┘                     │
//! │                    │ failure                                            │
//! │                    ▼                                                    │
//! │           retry_count += 1                                              │
//! │                    │                                                    │
//! │       ┌────────────┴─────────────┐                                     │
//! │       │ < ceiling                │ == ceiling                          │
//! │       ▼                          ▼                                      │
//! │   stays queued            ┌──────────┐                                 │
//! │   (next pass)             │ removed  │ (dropped)                       │
//! │                           └──────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted Shape
//! ```json
//! { "kind": "webhook", "payload": "{...}", "target": "https://hooks/x",
//!   "timestamp": "2026-01-01T12:00:00Z", "retry_count": 2 }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Endpoint used by API-call items that carry none.
pub const DEFAULT_API_ENDPOINT: &str = "/logs";

// =============================================================================
// Delivery
// =============================================================================

/// What to send and where. Each kind carries only its own data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// A delimited incident record, re-encoded to the wire form on send.
    RecordSync { payload: String },

    /// A pre-serialized body posted to an API endpoint.
    ApiCall {
        payload: String,
        #[serde(rename = "target", default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// A pre-serialized body posted to an arbitrary URL.
    Webhook {
        payload: String,
        #[serde(rename = "target")]
        url: String,
    },
}

impl Delivery {
    pub fn kind(&self) -> DeliveryKind {
        match self {
            Delivery::RecordSync { .. } => DeliveryKind::RecordSync,
            Delivery::ApiCall { .. } => DeliveryKind::ApiCall,
            Delivery::Webhook { .. } => DeliveryKind::Webhook,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Delivery::RecordSync { payload }
            | Delivery::ApiCall { payload, .. }
            | Delivery::Webhook { payload, .. } => payload,
        }
    }

    /// Endpoint or URL, if this kind has one.
    pub fn target(&self) -> Option<&str> {
        match self {
            Delivery::RecordSync { .. } => None,
            Delivery::ApiCall { endpoint, .. } => endpoint.as_deref(),
            Delivery::Webhook { url, .. } => Some(url),
        }
    }
}

/// Discriminant of [`Delivery`], for logging and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryKind {
    RecordSync,
    ApiCall,
    Webhook,
}

impl fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryKind::RecordSync => write!(f, "record_sync"),
            DeliveryKind::ApiCall => write!(f, "api_call"),
            DeliveryKind::Webhook => write!(f, "webhook"),
        }
    }
}

// =============================================================================
// Queue Item
// =============================================================================

/// One queued delivery with its retry accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub delivery: Delivery,

    /// When the item was enqueued.
    #[serde(rename = "timestamp")]
    pub enqueued_at: DateTime<Utc>,

    /// Failed delivery attempts so far. Only ever increases.
    #[serde(default)]
    pub retry_count: u32,
}

impl QueueItem {
    pub fn new(delivery: Delivery, now: DateTime<Utc>) -> Self {
        QueueItem {
            delivery,
            enqueued_at: now,
            retry_count: 0,
        }
    }

    pub fn kind(&self) -> DeliveryKind {
        self.delivery.kind()
    }

    /// Records a failed attempt and returns the new retry count.
    pub fn record_failure(&mut self) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_count
    }

    /// True once the item has failed `max_retries` times.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
