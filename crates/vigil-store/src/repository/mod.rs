//! # Repository Module
//!
//! Typed persistence built on the raw stores.
//!
//! ## Repositories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ConnectionManager                  DeliveryQueue                       │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  CredentialRepository               QueueStore (trait)                  │
//! │  ├── load() → RememberedNetworks    ├── load() → Vec<QueueItem>         │
//! │  └── save(&RememberedNetworks)      └── save(&[QueueItem])              │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  SettingsStore (wifi.*)             offline_queue.json                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`CredentialRepository`] - Remembered networks under `wifi.*`
//! - [`JsonFileQueueStore`] - Delivery queue file
//! - [`MemoryQueueStore`] - Delivery queue held in memory

pub mod credentials;
pub mod queue;

pub use credentials::CredentialRepository;
pub use queue::{JsonFileQueueStore, MemoryQueueStore, QueueStore};
