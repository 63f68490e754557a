//! # vigil-sync: Connectivity & Delivery Engine for Vigil
//!
//! Keeps the handheld logger online and gets its records off the device.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Device Agent (poll loop)                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         DeviceAgent                              │  │
//! │  │  tick(): connection.update() → delivery.update() → sync.update() │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ Connection     │  │ DeliveryQueue  │  │  SyncCoordinator       │    │
//! │  │ Manager        │  │                │  │                        │    │
//! │  │ Scan, rank by  │  │ Durable FIFO   │  │ Pending records        │    │
//! │  │ RSSI, connect, │  │ of API/webhook │  │ → webhook, status,     │    │
//! │  │ auto-reconnect │  │ work, retries  │  │ last sync time         │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          │ LinkHandle        │                       │                  │
//! │          └──── is_connected()┴───────────────────────┘                  │
//! │          │                   │                       │                  │
//! │          ▼                   ▼                       ▼                  │
//! │  ┌────────────────┐  ┌───────────────────────────────────────────┐     │
//! │  │ RadioAdapter   │  │ ApiClient / WebhookClient → HttpTransport │     │
//! │  └────────────────┘  └───────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - `DeviceAgent` owning and ticking the three components
//! - [`connection`] - Wireless connection state machine
//! - [`delivery`] - Persistent retrying delivery queue
//! - [`coordinator`] - Record sync to the webhook
//! - [`radio`] - Radio adapter seam and the simulated radio
//! - [`link`] - Read-only connectivity view
//! - [`transport`] - HTTP transport and backend API client
//! - [`webhook`] - Webhook client with fixed-interval retry
//! - [`config`] - Device configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vigil_sync::{AgentHandle, DeviceAgent, SimulatedRadio, VigilConfig};
//!
//! let config = VigilConfig::load_or_default(None);
//! let mut agent = DeviceAgent::init(config, radio, settings, queue_store, transport)?;
//!
//! let (handle, shutdown_rx) = AgentHandle::channel();
//! agent.run(shutdown_rx).await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod delivery;
pub mod error;
pub mod link;
pub mod radio;
pub mod transport;
pub mod webhook;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentEventEmitter, AgentHandle, AgentStatus, DeviceAgent, NoOpEmitter};
pub use config::{
    ApiSettings, DeliverySettings, DeviceConfig, RuntimeSettings, SyncSettings, VigilConfig,
    WifiSettings,
};
pub use connection::{
    AvailableNetwork, ConnectFailure, ConnectOutcome, ConnectTicket, ConnectedNetwork,
    ConnectionManager, SavedNetwork, ScanTicket,
};
pub use coordinator::{SyncCoordinator, SyncStatus};
pub use delivery::{DeliveryQueue, DeliveryStats};
pub use error::{SyncError, SyncResult};
pub use link::{ConnectionPhase, Connectivity, LinkHandle, LinkStatus, ManualLink};
pub use radio::{Encryption, RadioAdapter, RadioStatus, ScanPoll, ScannedNetwork, SimulatedRadio};
pub use transport::{ApiClient, HttpMethod, HttpResponse, HttpTransport, ReqwestTransport};
pub use webhook::{WebhookClient, WebhookSender};
