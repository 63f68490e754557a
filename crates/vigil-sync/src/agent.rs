//! # Device Agent
//!
//! Owns the connection manager, delivery queue and sync coordinator and
//! drives them from one poll loop.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          DeviceAgent                                    │
//! │                                                                         │
//! │  init(config, radio, settings, queue store, transport)                  │
//! │    │                                                                    │
//! │    ├─► ConnectionManager ── LinkHandle ──┬──► DeliveryQueue             │
//! │    │        (radio)                      └──► SyncCoordinator           │
//! │    └─► boot: connect_to_remembered() when auto-reconnect is on          │
//! │                                                                         │
//! │  run(shutdown)                                                          │
//! │    loop {                                                               │
//! │      select! {                                                          │
//! │        tick ──► connection.update()                                     │
//! │                 delivery.update().await                                 │
//! │                 sync.update().await                                     │
//! │                 emit status if changed                                  │
//! │        shutdown ──► break                                               │
//! │      }                                                                  │
//! │    }                                                                    │
//! │    shutdown(): persist queue, disconnect, radio off                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use vigil_core::IncidentRecord;
use vigil_store::{CredentialRepository, QueueStore, SettingsStore};

use crate::config::VigilConfig;
use crate::connection::ConnectionManager;
use crate::coordinator::{SyncCoordinator, SyncStatus};
use crate::delivery::DeliveryQueue;
use crate::error::{SyncError, SyncResult};
use crate::link::ConnectionPhase;
use crate::radio::RadioAdapter;
use crate::transport::{ApiClient, HttpTransport};
use crate::webhook::WebhookClient;

// =============================================================================
// Agent Status
// =============================================================================

/// Aggregate state shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub device_id: String,
    pub phase: ConnectionPhase,
    pub connected: bool,
    pub ssid: Option<String>,
    pub rssi: Option<i8>,
    /// Records waiting for the webhook.
    pub pending_records: usize,
    /// Items in the delivery queue.
    pub queued_deliveries: usize,
    pub delivered: u64,
    pub dropped: u64,
    pub sync_status: SyncStatus,
    pub last_sync_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives status snapshots when they change.
///
/// The display layer implements this to refresh its status bar.
pub trait AgentEventEmitter: Send + Sync {
    fn emit_status(&self, status: &AgentStatus);
}

/// No-op emitter for headless runs.
pub struct NoOpEmitter;

impl AgentEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &AgentStatus) {}
}

// =============================================================================
// Device Agent
// =============================================================================

pub struct DeviceAgent {
    config: VigilConfig,
    api: Arc<ApiClient>,
    connection: ConnectionManager,
    delivery: DeliveryQueue,
    sync: SyncCoordinator,
    emitter: Arc<dyn AgentEventEmitter>,
    last_emitted: Option<AgentStatus>,
}

impl DeviceAgent {
    /// Wires the components together.
    ///
    /// Remembered networks and the delivery queue are loaded here, once.
    pub fn init(
        config: VigilConfig,
        radio: Box<dyn RadioAdapter>,
        settings: Box<dyn SettingsStore>,
        queue_store: Box<dyn QueueStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let credentials = CredentialRepository::new(settings, config.wifi.max_networks);
        let mut connection = ConnectionManager::init(radio, credentials, config.wifi.clone());
        let link = Arc::new(connection.link_handle());

        let api = Arc::new(ApiClient::new(Arc::clone(&transport), &config.api));
        let webhook = Arc::new(WebhookClient::new(transport));

        let delivery = DeliveryQueue::open(
            queue_store,
            Arc::clone(&api),
            webhook.clone(),
            link.clone(),
            config.delivery.clone(),
        );
        let sync = SyncCoordinator::new(webhook, link, &config.sync);

        if connection.auto_reconnect() && !connection.remembered_networks().is_empty() {
            info!("Connecting to remembered networks on boot");
            drop(connection.connect_to_remembered());
        }

        info!(
            device_id = %config.device_id(),
            queued = delivery.size(),
            "Device agent initialised"
        );

        Ok(DeviceAgent {
            config,
            api,
            connection,
            delivery,
            sync,
            emitter: Arc::new(NoOpEmitter),
            last_emitted: None,
        })
    }

    /// Replaces the status emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn AgentEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    // =========================================================================
    // Loop
    // =========================================================================

    /// One poll of every component, in order.
    pub async fn tick(&mut self) {
        self.connection.update();
        self.delivery.update().await;
        self.sync.update().await;

        let status = self.status();
        if self.last_emitted.as_ref() != Some(&status) {
            debug!(phase = %status.phase, queued = status.queued_deliveries, "Status changed");
            self.emitter.emit_status(&status);
            self.last_emitted = Some(status);
        }
    }

    /// Ticks at the configured rate until `shutdown` fires or every
    /// [`AgentHandle`] is dropped, then shuts down.
    pub async fn run(&mut self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.runtime.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(tick_ms = self.config.runtime.tick_interval_ms, "Device agent running");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown();
    }

    /// Persists the queue and powers the radio down.
    pub fn shutdown(&mut self) {
        self.delivery.persist();
        self.connection.shutdown();
        info!(
            queued = self.delivery.size(),
            pending = self.sync.pending_sync_count(),
            "Device agent stopped"
        );
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Routes a saved record to every configured destination: the delivery
    /// queue when an API base URL is set, the sync coordinator when a webhook
    /// URL is set.
    pub fn record_incident(&mut self, record: IncidentRecord) -> SyncResult<()> {
        let to_api = self.api.base_url().is_some();
        let to_webhook = self.sync.webhook_url().is_some();

        if !to_api && !to_webhook {
            return Err(SyncError::MissingUrl("API base or webhook"));
        }
        info!(
            record = %record.summary(),
            api = to_api,
            webhook = to_webhook,
            "Incident recorded"
        );
        if to_api {
            self.delivery.enqueue_record_sync(&record)?;
        }
        if to_webhook {
            self.sync.queue_entry(record);
        }
        Ok(())
    }

    pub fn status(&self) -> AgentStatus {
        let network = self.connection.current_network();
        let stats = self.delivery.stats();

        AgentStatus {
            device_id: self.config.device_id().to_string(),
            phase: self.connection.phase(),
            connected: self.connection.is_connected(),
            ssid: network.map(|n| n.ssid.clone()),
            rssi: network.and_then(|n| n.rssi),
            pending_records: self.sync.pending_sync_count(),
            queued_deliveries: stats.queued,
            delivered: stats.delivered,
            dropped: stats.dropped,
            sync_status: self.sync.sync_status(),
            last_sync_time: self.sync.last_sync_time(),
        }
    }

    // =========================================================================
    // Component Access
    // =========================================================================

    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    pub fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }

    pub fn delivery_mut(&mut self) -> &mut DeliveryQueue {
        &mut self.delivery
    }

    pub fn sync(&self) -> &SyncCoordinator {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncCoordinator {
        &mut self.sync
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Signals a running [`DeviceAgent::run`] loop to stop.
#[derive(Clone)]
pub struct AgentHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl AgentHandle {
    /// Creates a handle and the receiver to pass to [`DeviceAgent::run`].
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (AgentHandle { shutdown_tx }, shutdown_rx)
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
