//! # Sync Coordinator
//!
//! Pushes incident records to the configured webhook, keeping the ones that
//! could not be sent for a later pass.
//!
//! ```text
//!  queue_entry(r) ──► pending ─┐
//!                              │ process_sync_queue(): take all
//!                              ▼
//!                    sync_entries(snapshot)
//!                      │
//!                      ├─ no URL / offline ──► all back to pending, Failed
//!                      │
//!                      └─ each record ─► wire JSON ─► webhook
//!                             ok  ─► discarded
//!                             err ─► back to pending
//! ```
//!
//! ## Locking
//! Every method that touches the network takes `&mut self`. A host sharing
//! the coordinator between tasks must hold one async mutex across the whole
//! of `process_sync_queue`, otherwise a `queue_entry` landing between the
//! take and the re-append interleaves with the records being retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vigil_core::IncidentRecord;

use crate::config::{validate_http_url, SyncSettings};
use crate::error::{SyncError, SyncResult};
use crate::link::Connectivity;
use crate::webhook::WebhookSender;

/// Outcome of the most recent sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    None,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::None => write!(f, "none"),
            SyncStatus::InProgress => write!(f, "in_progress"),
            SyncStatus::Completed => write!(f, "completed"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

pub struct SyncCoordinator {
    webhook: Arc<dyn WebhookSender>,
    link: Arc<dyn Connectivity>,
    webhook_url: Option<String>,
    pending: Vec<IncidentRecord>,
    status: SyncStatus,
    last_sync: Option<DateTime<Utc>>,
    auto_sync: bool,
    retry_interval: Duration,
    last_attempt: Instant,
}

impl SyncCoordinator {
    /// Builds the coordinator. An invalid configured URL is ignored with a
    /// warning so records are still collected.
    pub fn new(
        webhook: Arc<dyn WebhookSender>,
        link: Arc<dyn Connectivity>,
        settings: &SyncSettings,
    ) -> Self {
        let mut coordinator = SyncCoordinator {
            webhook,
            link,
            webhook_url: None,
            pending: Vec::new(),
            status: SyncStatus::None,
            last_sync: None,
            auto_sync: settings.auto_sync,
            retry_interval: settings.retry_interval(),
            last_attempt: Instant::now(),
        };
        if let Some(ref url) = settings.webhook_url {
            if let Err(e) = coordinator.set_webhook_url(url) {
                warn!(error = %e, "Ignoring configured webhook URL");
            }
        }
        coordinator
    }

    /// Adds a record to the pending list.
    pub fn queue_entry(&mut self, record: IncidentRecord) {
        self.pending.push(record);
        debug!(pending = self.pending.len(), "Record queued for sync");
    }

    /// Sends each record to the webhook.
    ///
    /// Without a URL or connectivity every record is deferred to the pending
    /// list and the call returns false. Records that fail to send are
    /// deferred the same way.
    pub async fn sync_entries(&mut self, records: Vec<IncidentRecord>) -> bool {
        self.last_attempt = Instant::now();

        let url = match self.webhook_url.clone() {
            Some(url) if self.link.is_connected() => url,
            url => {
                let reason = if url.is_none() { "no webhook URL" } else { "offline" };
                info!(records = records.len(), reason, "Sync deferred");
                self.pending.extend(records);
                self.status = SyncStatus::Failed;
                return false;
            }
        };

        self.status = SyncStatus::InProgress;
        info!(records = records.len(), "Syncing records");

        let mut failed = 0usize;
        for record in records {
            let sent = match record.to_wire_json() {
                Ok(json) => self.webhook.send(&url, &json).await,
                Err(e) => Err(SyncError::from(e)),
            };
            if let Err(e) = sent {
                warn!(timestamp = record.timestamp, error = %e, "Record sync failed");
                failed += 1;
                self.pending.push(record);
            }
        }

        if failed > 0 {
            self.status = SyncStatus::Failed;
            warn!(failed, pending = self.pending.len(), "Sync pass incomplete");
            false
        } else {
            self.status = SyncStatus::Completed;
            self.last_sync = Some(Utc::now());
            info!("Sync pass complete");
            true
        }
    }

    /// Retries everything pending. Failed records end up pending again.
    pub async fn process_sync_queue(&mut self) -> bool {
        if self.pending.is_empty() {
            return true;
        }
        let snapshot = std::mem::take(&mut self.pending);
        self.sync_entries(snapshot).await
    }

    /// Runs `process_sync_queue` when auto-sync is on, records are pending
    /// and the retry interval has passed since the last attempt.
    pub async fn update(&mut self) {
        if !self.auto_sync || self.pending.is_empty() {
            return;
        }
        if self.last_attempt.elapsed() < self.retry_interval {
            return;
        }
        self.process_sync_queue().await;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn sync_status(&self) -> SyncStatus {
        self.status
    }

    pub fn pending_sync_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> &[IncidentRecord] {
        &self.pending
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Sets the webhook URL; an empty string clears it.
    pub fn set_webhook_url(&mut self, url: &str) -> SyncResult<()> {
        let url = url.trim();
        if url.is_empty() {
            self.webhook_url = None;
            return Ok(());
        }
        validate_http_url(url)?;
        self.webhook_url = Some(url.to_string());
        Ok(())
    }

    pub fn set_auto_sync(&mut self, enabled: bool) {
        self.auto_sync = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ManualLink;
    use crate::test_support::ScriptedWebhook;

    const URL: &str = "https://hooks.example/lp";

    fn coordinator(webhook: &ScriptedWebhook, online: bool, url: Option<&str>) -> SyncCoordinator {
        let settings = SyncSettings {
            webhook_url: url.map(str::to_string),
            ..Default::default()
        };
        SyncCoordinator::new(
            Arc::new(webhook.clone()),
            Arc::new(ManualLink::new(online)),
            &settings,
        )
    }

    fn entry(ts: i64) -> IncidentRecord {
        IncidentRecord::new(ts)
    }

    #[tokio::test]
    async fn test_without_url_defers_everything() {
        let webhook = ScriptedWebhook::new();
        let mut sync = coordinator(&webhook, true, None);

        let ok = sync.sync_entries(vec![entry(1001), entry(1002)]).await;

        assert!(!ok);
        assert_eq!(sync.pending(), &[entry(1001), entry(1002)]);
        assert_eq!(sync.sync_status(), SyncStatus::Failed);
        assert!(webhook.sent().is_empty());
    }

    #[tokio::test]
    async fn test_offline_defers_everything() {
        let webhook = ScriptedWebhook::new();
        let mut sync = coordinator(&webhook, false, Some(URL));

        assert!(!sync.sync_entries(vec![entry(1001)]).await);
        assert_eq!(sync.pending_sync_count(), 1);
        assert!(webhook.sent().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_leaves_only_failed_record() {
        let webhook = ScriptedWebhook::new();
        webhook.fail_body_containing("\"timestamp\":1002");
        let mut sync = coordinator(&webhook, true, Some(URL));

        sync.queue_entry(entry(1001));
        sync.queue_entry(entry(1002));
        sync.queue_entry(entry(1003));

        assert!(!sync.process_sync_queue().await);
        assert_eq!(sync.pending(), &[entry(1002)]);
        assert_eq!(sync.sync_status(), SyncStatus::Failed);
        assert_eq!(webhook.sent().len(), 3);
        assert!(sync.last_sync_time().is_none());
    }

    #[tokio::test]
    async fn test_successful_pass_discards_records() {
        let webhook = ScriptedWebhook::new();
        let mut sync = coordinator(&webhook, true, Some(URL));
        sync.queue_entry(entry(1001));

        assert!(sync.process_sync_queue().await);
        assert_eq!(sync.pending_sync_count(), 0);
        assert_eq!(sync.sync_status(), SyncStatus::Completed);
        assert!(sync.last_sync_time().is_some());
        assert_eq!(webhook.sent()[0].0, URL);
    }

    #[tokio::test]
    async fn test_empty_queue_is_success_without_sends() {
        let webhook = ScriptedWebhook::new();
        let mut sync = coordinator(&webhook, true, Some(URL));

        assert!(sync.process_sync_queue().await);
        assert_eq!(sync.sync_status(), SyncStatus::None);
        assert!(webhook.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_respects_interval_and_flag() {
        let webhook = ScriptedWebhook::new();
        let mut sync = coordinator(&webhook, true, Some(URL));
        sync.queue_entry(entry(1001));

        sync.update().await;
        assert!(webhook.sent().is_empty());

        tokio::time::advance(Duration::from_secs(60)).await;
        sync.set_auto_sync(false);
        sync.update().await;
        assert!(webhook.sent().is_empty());

        sync.set_auto_sync(true);
        sync.update().await;
        assert_eq!(webhook.sent().len(), 1);
        assert_eq!(sync.pending_sync_count(), 0);
    }

    #[tokio::test]
    async fn test_set_webhook_url_validates() {
        let webhook = ScriptedWebhook::new();
        let mut sync = coordinator(&webhook, true, Some(URL));

        assert!(sync.set_webhook_url("ftp://hooks.example").is_err());
        assert_eq!(sync.webhook_url(), Some(URL));

        sync.set_webhook_url("").unwrap();
        assert!(sync.webhook_url().is_none());
    }
}
