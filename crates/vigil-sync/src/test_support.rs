//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::transport::{HttpMethod, HttpResponse, HttpTransport};
use crate::webhook::WebhookSender;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

// =============================================================================
// Transport
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct TransportState {
    requests: Vec<RecordedRequest>,
    responses: VecDeque<SyncResult<HttpResponse>>,
    /// Requests whose URL contains one of these fail with 500.
    failing_urls: Vec<String>,
}

/// Records requests and answers with scripted responses (200 by default).
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: u16) {
        self.push_response(status, "");
    }

    pub fn push_response(&self, status: u16, body: &str) {
        lock(&self.state).responses.push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_error(&self, message: &str) {
        lock(&self.state)
            .responses
            .push_back(Err(SyncError::Transport(message.to_string())));
    }

    pub fn fail_url_containing(&self, fragment: &str) {
        lock(&self.state).failing_urls.push(fragment.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
        headers: &[(String, String)],
    ) -> SyncResult<HttpResponse> {
        let mut state = lock(&self.state);
        state.requests.push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.map(str::to_string),
            headers: headers.to_vec(),
        });

        if state.failing_urls.iter().any(|f| url.contains(f.as_str())) {
            return Ok(HttpResponse {
                status: 500,
                body: String::new(),
            });
        }

        state.responses.pop_front().unwrap_or(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }))
    }
}

// =============================================================================
// Webhook
// =============================================================================

#[derive(Default)]
struct WebhookState {
    sent: Vec<(String, String)>,
    fail_all: bool,
    fail_next: usize,
    failing_bodies: Vec<String>,
}

/// Records webhook sends; fails on demand.
#[derive(Clone, Default)]
pub struct ScriptedWebhook {
    state: Arc<Mutex<WebhookState>>,
}

impl ScriptedWebhook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, fail: bool) {
        lock(&self.state).fail_all = fail;
    }

    pub fn fail_next(&self, count: usize) {
        lock(&self.state).fail_next = count;
    }

    /// Bodies containing `fragment` always fail.
    pub fn fail_body_containing(&self, fragment: &str) {
        lock(&self.state).failing_bodies.push(fragment.to_string());
    }

    /// Every attempted send as `(url, body)`, including failures.
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.state).sent.clone()
    }
}

#[async_trait]
impl WebhookSender for ScriptedWebhook {
    async fn send(&self, url: &str, json_body: &str) -> SyncResult<()> {
        let mut state = lock(&self.state);
        state.sent.push((url.to_string(), json_body.to_string()));

        let body_fails = state
            .failing_bodies
            .iter()
            .any(|f| json_body.contains(f.as_str()));
        let fail = if state.fail_next > 0 {
            state.fail_next -= 1;
            true
        } else {
            state.fail_all || body_fails
        };

        if fail {
            Err(SyncError::HttpStatus {
                status: 500,
                url: url.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
