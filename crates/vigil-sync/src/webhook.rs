//! # Webhook Client
//!
//! POSTs a JSON document to an arbitrary URL.
//!
//! ## Retry Wrapper
//! ```text
//!  send_with_retry(url, body, max_retries = 2, interval = 5s)
//!
//!  attempt 1 ──✗── wait 5s ── attempt 2 ──✗── wait 5s ── attempt 3 ──✗── Err
//!                                                         (max_retries + 1)
//! ```
//!
//! The wrapper blocks its caller for up to `max_retries × interval`. The
//! delivery queue and sync coordinator call [`WebhookSender::send`] once per
//! pass instead and rely on their own retry accounting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::{Backoff, Constant};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::transport::HttpTransport;

/// Posts JSON bodies to webhook URLs.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Sends once. Only a 2xx response is success.
    async fn send(&self, url: &str, json_body: &str) -> SyncResult<()>;

    /// Sends with at most `max_retries + 1` attempts, `interval` apart.
    async fn send_with_retry(
        &self,
        url: &str,
        json_body: &str,
        max_retries: u32,
        interval: Duration,
    ) -> SyncResult<()> {
        let mut schedule = Constant::new(interval);
        let attempts = max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            match self.send(url, json_body).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_config_error() => return Err(e),
                Err(e) => {
                    warn!(url, attempt, error = %e, "Webhook attempt failed");
                }
            }

            if attempt < attempts {
                if let Some(wait) = schedule.next_backoff() {
                    tokio::time::sleep(wait).await;
                }
            }
        }

        Err(SyncError::RetriesExceeded { attempts })
    }
}

/// [`WebhookSender`] over an [`HttpTransport`].
pub struct WebhookClient {
    transport: Arc<dyn HttpTransport>,
}

impl WebhookClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        WebhookClient { transport }
    }
}

#[async_trait]
impl WebhookSender for WebhookClient {
    async fn send(&self, url: &str, json_body: &str) -> SyncResult<()> {
        if url.trim().is_empty() {
            return Err(SyncError::MissingUrl("webhook"));
        }

        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        let response = self.transport.post(url, json_body, &headers).await?;

        if response.is_success() {
            debug!(url, status = response.status, "Webhook delivered");
            Ok(())
        } else {
            Err(SyncError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            })
        }
    }
}
