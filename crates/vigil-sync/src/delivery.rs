//! # Delivery Queue
//!
//! Durable store-and-forward queue for outbound network work.
//!
//! ## Drain Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          drain()                                        │
//! │                                                                         │
//! │  empty or offline? ──yes──► return 0 (nothing touched, nothing saved)   │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │  for each item, FIFO, once:                                             │
//! │     RecordSync ─► decode delimited ─► wire JSON ─► POST <api>/logs      │
//! │     ApiCall    ─► POST <api><endpoint or /logs>  (payload verbatim)     │
//! │     Webhook    ─► POST <url>                     (payload verbatim)     │
//! │                                                                         │
//! │     ok  ─────────────────────────► remove                               │
//! │     err ─► retry_count += 1 ─┬──► keep        (below ceiling)           │
//! │                              └──► remove, dropped += 1 (at ceiling)     │
//! │                                                                         │
//! │  one stable retain pass ─► rewrite persisted queue                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation rewrites the whole persisted queue before returning.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vigil_core::outbox::DEFAULT_API_ENDPOINT;
use vigil_core::validation::validate_record;
use vigil_core::{CoreError, Delivery, IncidentRecord, QueueItem};
use vigil_store::QueueStore;

use crate::config::DeliverySettings;
use crate::error::{SyncError, SyncResult};
use crate::link::Connectivity;
use crate::transport::ApiClient;
use crate::webhook::WebhookSender;

/// Cumulative delivery counters since the queue was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub queued: usize,
    pub delivered: u64,
    /// Items removed after reaching the retry ceiling.
    pub dropped: u64,
}

/// Persistent FIFO of deliveries.
pub struct DeliveryQueue {
    store: Box<dyn QueueStore>,
    items: Vec<QueueItem>,
    api: Arc<ApiClient>,
    webhook: Arc<dyn WebhookSender>,
    link: Arc<dyn Connectivity>,
    settings: DeliverySettings,
    auto_process: bool,
    last_drain: Instant,
    delivered: u64,
    dropped: u64,
}

impl DeliveryQueue {
    /// Opens the queue, loading persisted items once.
    ///
    /// An unreadable queue file starts an empty queue.
    pub fn open(
        store: Box<dyn QueueStore>,
        api: Arc<ApiClient>,
        webhook: Arc<dyn WebhookSender>,
        link: Arc<dyn Connectivity>,
        settings: DeliverySettings,
    ) -> Self {
        let items = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Delivery queue unreadable, starting empty");
            Vec::new()
        });
        if !items.is_empty() {
            info!(queue_len = items.len(), "Restored delivery queue");
        }

        DeliveryQueue {
            store,
            items,
            api,
            webhook,
            link,
            auto_process: settings.auto_process,
            settings,
            last_drain: Instant::now(),
            delivered: 0,
            dropped: 0,
        }
    }

    // =========================================================================
    // Enqueue
    // =========================================================================

    /// Queues a record for the API `/logs` endpoint.
    pub fn enqueue_record_sync(&mut self, record: &IncidentRecord) -> SyncResult<()> {
        validate_record(record).map_err(CoreError::from)?;
        self.push(Delivery::RecordSync {
            payload: record.to_delimited(),
        });
        Ok(())
    }

    /// Queues a pre-serialized body for an API endpoint (default `/logs`).
    pub fn enqueue_api_call(&mut self, endpoint: Option<&str>, body: impl Into<String>) {
        self.push(Delivery::ApiCall {
            payload: body.into(),
            endpoint: endpoint.filter(|e| !e.is_empty()).map(str::to_string),
        });
    }

    /// Queues a body for a webhook URL.
    pub fn enqueue_webhook(&mut self, url: &str, body: impl Into<String>) -> SyncResult<()> {
        if url.trim().is_empty() {
            return Err(SyncError::MissingUrl("webhook"));
        }
        self.push(Delivery::Webhook {
            payload: body.into(),
            url: url.to_string(),
        });
        Ok(())
    }

    fn push(&mut self, delivery: Delivery) {
        let item = QueueItem::new(delivery, Utc::now());
        debug!(kind = %item.kind(), queue_len = self.items.len() + 1, "Queued delivery");
        self.items.push(item);
        self.persist();
    }

    // =========================================================================
    // Drain
    // =========================================================================

    /// Attempts every item once. Returns how many were delivered.
    pub async fn drain(&mut self) -> usize {
        if self.items.is_empty() {
            return 0;
        }
        if !self.link.is_connected() {
            debug!(queue_len = self.items.len(), "Offline, delivery deferred");
            return 0;
        }

        self.last_drain = Instant::now();
        let api = Arc::clone(&self.api);
        let webhook = Arc::clone(&self.webhook);
        let max_retries = self.settings.max_retries;

        info!(queue_len = self.items.len(), "Draining delivery queue");

        let mut keep = Vec::with_capacity(self.items.len());
        let mut delivered = 0usize;

        for index in 0..self.items.len() {
            let delivery = self.items[index].delivery.clone();
            let result = deliver(&api, webhook.as_ref(), &delivery).await;
            let item = &mut self.items[index];

            match result {
                Ok(()) => {
                    debug!(kind = %item.kind(), "Delivered");
                    delivered += 1;
                    keep.push(false);
                }
                Err(e) => {
                    let retry_count = item.record_failure();
                    if item.is_exhausted(max_retries) {
                        warn!(
                            kind = %item.kind(),
                            retry_count,
                            error = %e,
                            "Delivery retries exhausted, dropping item"
                        );
                        self.dropped += 1;
                        keep.push(false);
                    } else {
                        debug!(kind = %item.kind(), retry_count, error = %e, "Delivery failed");
                        keep.push(true);
                    }
                }
            }
        }

        let mut mask = keep.into_iter();
        self.items.retain(|_| mask.next().unwrap_or(true));
        self.delivered += delivered as u64;
        self.persist();

        info!(delivered, queue_len = self.items.len(), "Drain complete");
        delivered
    }

    /// Drains when auto-processing is on, work is queued and the retry
    /// interval has passed since the last drain.
    pub async fn update(&mut self) -> usize {
        if !self.auto_process || self.items.is_empty() {
            return 0;
        }
        if self.last_drain.elapsed() < self.settings.retry_interval() {
            return 0;
        }
        self.last_drain = Instant::now();
        self.drain().await
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn clear(&mut self) {
        info!(queue_len = self.items.len(), "Clearing delivery queue");
        self.items.clear();
        self.persist();
    }

    pub fn set_auto_processing(&mut self, enabled: bool) {
        self.auto_process = enabled;
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            queued: self.items.len(),
            delivered: self.delivered,
            dropped: self.dropped,
        }
    }

    /// Rewrites the persisted queue. Failures are logged; the in-memory
    /// queue stays authoritative until the next successful write.
    pub fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.items) {
            warn!(error = %e, queue_len = self.items.len(), "Failed to persist delivery queue");
        }
    }
}

async fn deliver(api: &ApiClient, webhook: &dyn WebhookSender, delivery: &Delivery) -> SyncResult<()> {
    match delivery {
        Delivery::RecordSync { payload } => {
            let record = IncidentRecord::from_delimited(payload)?;
            let json = record.to_wire_json()?;
            api.send_log_entry(&json).await
        }
        Delivery::ApiCall { payload, endpoint } => {
            let endpoint = endpoint.as_deref().unwrap_or(DEFAULT_API_ENDPOINT);
            api.post_json(endpoint, payload).await.map(|_| ())
        }
        Delivery::Webhook { payload, url } => webhook.send(url, payload).await,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use vigil_core::{Color, DeliveryKind, Gender, ItemType};
    use vigil_store::{JsonFileQueueStore, MemoryQueueStore};

    use crate::config::ApiSettings;
    use crate::link::ManualLink;
    use crate::test_support::{ScriptedTransport, ScriptedWebhook};

    struct Harness {
        store: MemoryQueueStore,
        transport: ScriptedTransport,
        webhook: ScriptedWebhook,
        link: ManualLink,
    }

    impl Harness {
        fn new(online: bool) -> Self {
            Harness {
                store: MemoryQueueStore::new(),
                transport: ScriptedTransport::new(),
                webhook: ScriptedWebhook::new(),
                link: ManualLink::new(online),
            }
        }

        fn open_with(&self, store: Box<dyn QueueStore>) -> DeliveryQueue {
            let api = ApiClient::new(
                Arc::new(self.transport.clone()),
                &ApiSettings {
                    base_url: Some("https://lp.example/api".into()),
                    ..Default::default()
                },
            );
            DeliveryQueue::open(
                store,
                Arc::new(api),
                Arc::new(self.webhook.clone()),
                Arc::new(self.link.clone()),
                DeliverySettings::default(),
            )
        }

        fn open(&self) -> DeliveryQueue {
            self.open_with(Box::new(self.store.clone()))
        }
    }

    fn record(ts: i64) -> IncidentRecord {
        IncidentRecord {
            gender: Gender::Female,
            shirt: Color::new("Red", 0xff0000),
            item_type: ItemType::Electronics,
            item_description: "Earbuds".into(),
            ..IncidentRecord::new(ts)
        }
    }

    #[tokio::test]
    async fn test_drain_delivers_every_kind_in_order() {
        let h = Harness::new(true);
        let mut queue = h.open();

        queue.enqueue_record_sync(&record(1_700_000_000)).unwrap();
        queue.enqueue_api_call(None, "{\"n\":1}");
        queue.enqueue_webhook("https://hooks.example/lp", "{\"n\":2}").unwrap();
        assert_eq!(queue.size(), 3);

        let delivered = queue.drain().await;

        assert_eq!(delivered, 3);
        assert_eq!(queue.size(), 0);
        assert!(h.store.items().is_empty());

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "https://lp.example/api/logs");
        let body = requests[0].body.as_deref().unwrap();
        assert!(body.contains("\"item_description\":\"Earbuds\""));
        assert!(body.contains("\"shirt_rgb\":\"ff0000\""));
        assert_eq!(requests[1].url, "https://lp.example/api/logs");
        assert_eq!(requests[1].body.as_deref(), Some("{\"n\":1}"));

        assert_eq!(
            h.webhook.sent(),
            vec![("https://hooks.example/lp".to_string(), "{\"n\":2}".to_string())]
        );
        assert_eq!(queue.stats().delivered, 3);
    }

    #[tokio::test]
    async fn test_api_call_uses_its_endpoint() {
        let h = Harness::new(true);
        let mut queue = h.open();

        queue.enqueue_api_call(Some("/audit"), "{}");
        queue.drain().await;

        assert_eq!(h.transport.requests()[0].url, "https://lp.example/api/audit");
    }

    #[tokio::test]
    async fn test_failing_item_dropped_exactly_at_ceiling() {
        let h = Harness::new(true);
        h.webhook.fail_all(true);
        let mut queue = h.open();
        queue.enqueue_webhook("https://hooks.example/lp", "{}").unwrap();

        for attempt in 1..5 {
            assert_eq!(queue.drain().await, 0);
            assert_eq!(queue.size(), 1, "dropped early at attempt {}", attempt);
            assert_eq!(queue.items()[0].retry_count, attempt);
        }

        assert_eq!(queue.drain().await, 0);
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.stats().dropped, 1);
        assert_eq!(h.webhook.sent().len(), 5);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order_of_survivors() {
        let h = Harness::new(true);
        h.transport.fail_url_containing("/audit");
        let mut queue = h.open();

        queue.enqueue_api_call(None, "first");
        queue.enqueue_api_call(Some("/audit"), "second");
        queue.enqueue_api_call(None, "third");
        queue.enqueue_api_call(Some("/audit"), "fourth");

        assert_eq!(queue.drain().await, 2);

        let payloads: Vec<&str> = queue.items().iter().map(|i| i.delivery.payload()).collect();
        assert_eq!(payloads, vec!["second", "fourth"]);
        assert!(queue.items().iter().all(|i| i.retry_count == 1));
        assert_eq!(h.store.items(), queue.items());
    }

    #[tokio::test]
    async fn test_transport_error_counts_as_failure() {
        let h = Harness::new(true);
        h.transport.push_error("connection reset");
        let mut queue = h.open();

        queue.enqueue_api_call(None, "{}");
        assert_eq!(queue.drain().await, 0);
        assert_eq!(queue.items()[0].retry_count, 1);
    }

    #[tokio::test]
    async fn test_drain_is_noop_when_empty_or_offline() {
        let h = Harness::new(false);
        let mut queue = h.open();

        assert_eq!(queue.drain().await, 0);
        assert_eq!(h.store.save_count(), 0);

        queue.enqueue_api_call(None, "{}");
        let saves = h.store.save_count();
        let before = queue.items().to_vec();

        assert_eq!(queue.drain().await, 0);
        assert_eq!(queue.items(), before.as_slice());
        assert_eq!(h.store.save_count(), saves);
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_offline_record_delivered_once_online() {
        let h = Harness::new(false);
        let mut queue = h.open();

        queue.enqueue_record_sync(&record(1_700_000_100)).unwrap();
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.drain().await, 0);

        h.link.set_connected(true);
        assert_eq!(queue.drain().await, 1);
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_persists_each_mutation() {
        let h = Harness::new(false);
        let mut queue = h.open();

        queue.enqueue_api_call(None, "a");
        queue.enqueue_webhook("https://hooks.example/lp", "b").unwrap();
        assert_eq!(h.store.save_count(), 2);
        assert_eq!(h.store.items().len(), 2);

        queue.clear();
        assert!(h.store.items().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_rejects_bad_input() {
        let h = Harness::new(true);
        let mut queue = h.open();

        let mut bad = record(1);
        bad.item_description = "a|b".into();
        assert!(queue.enqueue_record_sync(&bad).is_err());
        assert!(queue.enqueue_webhook("  ", "{}").unwrap_err().is_config_error());
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_restores_persisted_queue() {
        let h = Harness::new(false);
        let dir = tempfile::tempdir().unwrap();

        let mut queue = h.open_with(Box::new(JsonFileQueueStore::in_dir(dir.path())));
        queue.enqueue_record_sync(&record(1_700_000_200)).unwrap();
        queue.enqueue_api_call(Some("/audit"), "{}");
        queue.enqueue_webhook("https://hooks.example/lp", "{}").unwrap();

        h.link.set_connected(true);
        h.transport.fail_url_containing("/");
        h.webhook.fail_all(true);
        queue.drain().await;
        let expected = queue.items().to_vec();
        drop(queue);

        let reopened = h.open_with(Box::new(JsonFileQueueStore::in_dir(dir.path())));
        assert_eq!(reopened.items(), expected.as_slice());
        assert_eq!(reopened.items()[0].kind(), DeliveryKind::RecordSync);
        assert!(reopened.items().iter().all(|i| i.retry_count == 1));
    }

    #[tokio::test]
    async fn test_corrupt_queue_file_starts_empty() {
        let h = Harness::new(false);
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileQueueStore::in_dir(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();

        let queue = h.open_with(Box::new(store));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_waits_for_interval_and_flag() {
        let h = Harness::new(true);
        let mut queue = h.open();
        queue.enqueue_api_call(None, "{}");

        assert_eq!(queue.update().await, 0);
        assert_eq!(queue.size(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        queue.set_auto_processing(false);
        assert_eq!(queue.update().await, 0);

        queue.set_auto_processing(true);
        assert_eq!(queue.update().await, 1);
        assert!(queue.is_empty());
    }
}
