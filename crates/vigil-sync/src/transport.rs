//! # HTTP Transport
//!
//! Request/response plumbing and the backend API client.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          HTTP Layers                                    │
//! │                                                                         │
//! │  DeliveryQueue                      SyncCoordinator                     │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ApiClient                          WebhookClient (webhook.rs)          │
//! │  ├── base URL + endpoint                  │                             │
//! │  ├── X-API-Key / Bearer headers           │                             │
//! │  └── last status code                     │                             │
//! │       │                                   │                             │
//! │       └─────────────┬─────────────────────┘                             │
//! │                     ▼                                                   │
//! │            HttpTransport (trait)                                        │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │            ReqwestTransport (fixed request timeout)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use vigil_core::APP_VERSION;

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};

/// Header list passed to [`HttpTransport::request`].
pub type Headers = Vec<(String, String)>;

// =============================================================================
// Request / Response
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Generic HTTP client.
///
/// A response with any status is `Ok`; `Err` means no response arrived.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
        headers: &[(String, String)],
    ) -> SyncResult<HttpResponse>;

    async fn get(&self, url: &str, headers: &[(String, String)]) -> SyncResult<HttpResponse> {
        self.request(HttpMethod::Get, url, None, headers).await
    }

    async fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> SyncResult<HttpResponse> {
        self.request(HttpMethod::Post, url, Some(body), headers).await
    }

    async fn put(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> SyncResult<HttpResponse> {
        self.request(HttpMethod::Put, url, Some(body), headers).await
    }

    async fn delete(&self, url: &str, headers: &[(String, String)]) -> SyncResult<HttpResponse> {
        self.request(HttpMethod::Delete, url, None, headers).await
    }
}

// =============================================================================
// Reqwest Transport
// =============================================================================

/// [`HttpTransport`] backed by `reqwest` with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(ReqwestTransport { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout.as_millis() as u64)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
        headers: &[(String, String)],
    ) -> SyncResult<HttpResponse> {
        let mut builder = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        debug!(%method, url, status, "HTTP request complete");
        Ok(HttpResponse { status, body })
    }
}

fn user_agent() -> String {
    format!("LossPreventionLog/{}", APP_VERSION)
}

// =============================================================================
// API Client
// =============================================================================

/// Endpoint receiving log entries.
pub const LOGS_ENDPOINT: &str = "/logs";

/// Endpoint serving aggregate statistics.
pub const STATISTICS_ENDPOINT: &str = "/statistics";

/// Client for the loss-prevention backend.
///
/// ## Usage
/// ```rust,ignore
/// let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(10))?);
/// let mut api = ApiClient::new(transport, &config.api);
/// api.send_log_entry(&record.to_wire_json()?).await?;
/// ```
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Option<String>,
    api_key: Option<String>,
    bearer_token: Option<String>,
    /// Status of the most recent response; 0 when none.
    last_status: AtomicU16,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: &ApiSettings) -> Self {
        let mut client = ApiClient {
            transport,
            base_url: None,
            api_key: settings.api_key.clone(),
            bearer_token: settings.bearer_token.clone(),
            last_status: AtomicU16::new(0),
        };
        if let Some(ref url) = settings.base_url {
            client.set_base_url(url);
        }
        client
    }

    /// Sets the base URL. A trailing `/` is dropped; empty clears it.
    pub fn set_base_url(&mut self, url: &str) {
        let trimmed = url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer_token = token.filter(|t| !t.is_empty());
    }

    /// Status code of the last response, if a response arrived.
    pub fn last_status(&self) -> Option<u16> {
        match self.last_status.load(Ordering::Relaxed) {
            0 => None,
            status => Some(status),
        }
    }

    pub fn is_last_request_successful(&self) -> bool {
        self.last_status()
            .map(|s| (200..300).contains(&s))
            .unwrap_or(false)
    }

    /// Resolves `endpoint` against the base URL.
    ///
    /// Absolute `http(s)://` endpoints are used as-is.
    pub fn endpoint_url(&self, endpoint: &str) -> SyncResult<String> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint.to_string());
        }
        let base = self.base_url.as_deref().ok_or(SyncError::MissingUrl("API base"))?;
        if endpoint.starts_with('/') {
            Ok(format!("{}{}", base, endpoint))
        } else {
            Ok(format!("{}/{}", base, endpoint))
        }
    }

    fn headers(&self, with_json_body: bool) -> Headers {
        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), user_agent()),
        ];
        if with_json_body {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(ref key) = self.api_key {
            headers.push(("X-API-Key".to_string(), key.clone()));
        }
        if let Some(ref token) = self.bearer_token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }

    async fn call(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&str>,
    ) -> SyncResult<HttpResponse> {
        let url = self.endpoint_url(endpoint)?;
        let headers = self.headers(body.is_some());

        let response = match self.transport.request(method, &url, body, &headers).await {
            Ok(response) => response,
            Err(e) => {
                self.last_status.store(0, Ordering::Relaxed);
                return Err(e);
            }
        };
        self.last_status.store(response.status, Ordering::Relaxed);

        if response.is_success() {
            Ok(response)
        } else {
            warn!(%method, url = %url, status = response.status, "API request rejected");
            Err(SyncError::HttpStatus {
                status: response.status,
                url,
            })
        }
    }

    /// POSTs a JSON body to `endpoint`.
    pub async fn post_json(&self, endpoint: &str, json: &str) -> SyncResult<HttpResponse> {
        self.call(HttpMethod::Post, endpoint, Some(json)).await
    }

    /// POSTs one wire-encoded record to `/logs`.
    pub async fn send_log_entry(&self, json: &str) -> SyncResult<()> {
        self.post_json(LOGS_ENDPOINT, json).await.map(|_| ())
    }

    /// GETs `/statistics` and parses the JSON body.
    pub async fn statistics(&self) -> SyncResult<serde_json::Value> {
        let response = self.call(HttpMethod::Get, STATISTICS_ENDPOINT, None).await?;
        Ok(serde_json::from_str(&response.body)?)
    }
}
