//! # Connection Manager
//!
//! Wireless connection lifecycle: scanning, ranking remembered networks,
//! sequential attempts with per-candidate timeouts, and auto-reconnect.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Connection Manager States                           │
//! │                                                                         │
//! │              connect_to_remembered()                                    │
//! │  ┌──────┐ ─────────────────────────► ┌──────────┐                       │
//! │  │ Idle │                            │ Scanning │                       │
//! │  └──────┘ ◄──┐                       └────┬─────┘                       │
//! │     │  ▲     │                  scan done │ rank by RSSI                │
//! │     │  │     │ exhausted                  ▼                             │
//! │     │  │     │ (report failure)  ┌────────────┐  Connected  ┌─────────┐ │
//! │     │  │     └────────────────── │ Connecting │ ──────────► │Connected│ │
//! │     │  │                         └─────┬──────┘             └────┬────┘ │
//! │     │  │              timeout / radio  │   ▲                     │      │
//! │     │  │              failure          ▼   │ next candidate      │      │
//! │     │  │                         ┌────────────┐                  │      │
//! │     │  │                         │   Failed   │                  │      │
//! │     │  │                         └────────────┘                  │      │
//! │     │  └──────────────────────────── link drop ──────────────────┘      │
//! │     │                                                                   │
//! │     └── connect(credential) ─► Connecting (single candidate)            │
//! │                                                                         │
//! │  AUTO-RECONNECT (from Idle)                                            │
//! │  ───────────────────────────                                           │
//! │  fires when: no attempt in flight, flag on, radio disconnected,        │
//! │              remembered networks exist, reconnect interval elapsed     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Completion
//! Every request returns a ticket backed by a one-shot channel. The outcome
//! may already be there when the call returns, or it may arrive on a later
//! [`ConnectionManager::update`] tick. Callers either poll the ticket on
//! their next tick or await it while something else drives `update()`.

use std::net::IpAddr;

use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vigil_core::validation::{validate_password, validate_ssid};
use vigil_core::{NetworkCredential, RememberedNetworks, UpsertOutcome};
use vigil_store::CredentialRepository;

use crate::config::WifiSettings;
use crate::error::SyncResult;
use crate::link::{ConnectionPhase, LinkHandle, LinkStatus};
use crate::radio::{Encryption, RadioAdapter, RadioStatus, ScanPoll, ScannedNetwork};

// =============================================================================
// Outcomes and Tickets
// =============================================================================

/// The network the device is associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedNetwork {
    pub ssid: String,
    pub rssi: Option<i8>,
    pub ip: Option<IpAddr>,
}

/// Why a connection request did not end in `Connected`.
///
/// None of these are fatal; the manager is back in `Idle` and the request
/// can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    #[error("no remembered networks")]
    NoRememberedNetworks,

    #[error("all {tried} candidate networks failed")]
    AttemptsExhausted { tried: usize },

    #[error("radio unavailable: {0}")]
    RadioUnavailable(String),

    #[error("superseded by a newer connection request")]
    Superseded,

    #[error("cancelled by disconnect")]
    Cancelled,

    /// The manager was dropped before the request finished.
    #[error("connection manager went away")]
    Abandoned,
}

pub type ConnectOutcome = Result<ConnectedNetwork, ConnectFailure>;

/// Pending result of a connection request.
#[derive(Debug)]
pub struct ConnectTicket {
    rx: oneshot::Receiver<ConnectOutcome>,
}

impl ConnectTicket {
    fn channel() -> (Self, oneshot::Sender<ConnectOutcome>) {
        let (tx, rx) = oneshot::channel();
        (ConnectTicket { rx }, tx)
    }

    /// Returns the outcome if it has arrived.
    ///
    /// Yields `Some` at most once; later calls report `Abandoned`.
    pub fn try_outcome(&mut self) -> Option<ConnectOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(ConnectFailure::Abandoned)),
        }
    }

    /// Waits for the outcome. Something must keep calling `update()`.
    pub async fn outcome(self) -> ConnectOutcome {
        self.rx.await.unwrap_or(Err(ConnectFailure::Abandoned))
    }
}

/// An access point from a user-requested scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableNetwork {
    pub ssid: String,
    pub rssi: i8,
    pub encryption: Encryption,
    pub is_remembered: bool,
}

/// Pending result of [`ConnectionManager::scan`].
#[derive(Debug)]
pub struct ScanTicket {
    rx: oneshot::Receiver<Vec<AvailableNetwork>>,
}

impl ScanTicket {
    /// Returns the networks if the scan has finished.
    pub fn try_networks(&mut self) -> Option<Vec<AvailableNetwork>> {
        match self.rx.try_recv() {
            Ok(networks) => Some(networks),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Vec::new()),
        }
    }

    pub async fn networks(self) -> Vec<AvailableNetwork> {
        self.rx.await.unwrap_or_default()
    }
}

/// A remembered network as shown to the user. No password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedNetwork {
    pub ssid: String,
    pub last_known_signal: Option<i8>,
}

// =============================================================================
// Attempt State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptPhase {
    Scanning,
    Connecting,
    Failed,
}

/// One in-flight connection request. Reset per request.
struct ConnectionAttempt {
    phase: AttemptPhase,
    /// When the current phase (scan or candidate) began.
    started_at: Instant,
    attempt_index: usize,
    candidates: Vec<NetworkCredential>,
    reply: Option<oneshot::Sender<ConnectOutcome>>,
}

impl ConnectionAttempt {
    fn resolve(&mut self, outcome: ConnectOutcome) {
        if let Some(reply) = self.reply.take() {
            // The caller may have dropped its ticket.
            let _ = reply.send(outcome);
        }
    }

    fn current_ssid(&self) -> Option<&str> {
        self.candidates
            .get(self.attempt_index)
            .map(|c| c.ssid.as_str())
    }
}

/// What `update()` should do with the in-flight attempt.
enum Step {
    Wait,
    Connected,
    CandidateFailed,
    NextCandidate,
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Sole owner of the radio.
pub struct ConnectionManager {
    radio: Box<dyn RadioAdapter>,
    credentials: CredentialRepository,
    remembered: RememberedNetworks,
    settings: WifiSettings,
    auto_reconnect: bool,
    attempt: Option<ConnectionAttempt>,
    scan_in_flight: bool,
    scan_started_at: Instant,
    scan_waiters: Vec<oneshot::Sender<Vec<AvailableNetwork>>>,
    connected: Option<ConnectedNetwork>,
    last_reconnect: Instant,
    link_tx: watch::Sender<LinkStatus>,
}

impl ConnectionManager {
    /// Builds the manager and loads remembered networks once.
    pub fn init(
        radio: Box<dyn RadioAdapter>,
        credentials: CredentialRepository,
        settings: WifiSettings,
    ) -> Self {
        let remembered = credentials.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load remembered networks, starting empty");
            RememberedNetworks::new(credentials.max_networks())
        });
        info!(remembered = remembered.len(), "Connection manager initialised");

        let now = Instant::now();
        let (link_tx, _) = watch::channel(LinkStatus::default());

        let mut manager = ConnectionManager {
            radio,
            credentials,
            remembered,
            auto_reconnect: settings.auto_reconnect,
            settings,
            attempt: None,
            scan_in_flight: false,
            scan_started_at: now,
            scan_waiters: Vec::new(),
            connected: None,
            last_reconnect: now,
            link_tx,
        };
        manager.watch_link();
        manager.publish();
        manager
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    pub fn current_network(&self) -> Option<&ConnectedNetwork> {
        self.connected.as_ref()
    }

    pub fn current_ssid(&self) -> Option<String> {
        self.connected.as_ref().map(|n| n.ssid.clone())
    }

    pub fn current_rssi(&self) -> Option<i8> {
        self.connected.as_ref().and_then(|_| self.radio.rssi())
    }

    pub fn phase(&self) -> ConnectionPhase {
        match &self.attempt {
            Some(attempt) => match attempt.phase {
                AttemptPhase::Scanning => ConnectionPhase::Scanning,
                AttemptPhase::Connecting => ConnectionPhase::Connecting,
                AttemptPhase::Failed => ConnectionPhase::Failed,
            },
            None if self.connected.is_some() => ConnectionPhase::Connected,
            None => ConnectionPhase::Idle,
        }
    }

    /// Reader for components that only need connectivity.
    pub fn link_handle(&self) -> LinkHandle {
        LinkHandle::new(self.link_tx.subscribe())
    }

    pub fn remembered_networks(&self) -> Vec<SavedNetwork> {
        self.remembered
            .iter()
            .map(|c| SavedNetwork {
                ssid: c.ssid.clone(),
                last_known_signal: c.last_known_signal,
            })
            .collect()
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        info!(enabled, "Auto-reconnect changed");
        self.auto_reconnect = enabled;
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Connects to one network.
    ///
    /// Invalid credentials fail synchronously without touching the radio.
    /// With `remember`, the credential is upserted and the list persisted
    /// before the attempt starts.
    pub fn connect(
        &mut self,
        credential: NetworkCredential,
        remember: bool,
    ) -> SyncResult<ConnectTicket> {
        validate_ssid(&credential.ssid)?;
        validate_password(&credential.password)?;

        if remember {
            match self.remembered.upsert(credential.clone()) {
                UpsertOutcome::Updated => debug!(ssid = %credential.ssid, "Updated remembered network"),
                UpsertOutcome::Added => info!(ssid = %credential.ssid, "Remembered network"),
                UpsertOutcome::AddedWithEviction(evicted) => info!(
                    ssid = %credential.ssid,
                    evicted = %evicted,
                    "Remembered network, list full"
                ),
            }
            self.persist_remembered();
        }

        let (ticket, reply) = ConnectTicket::channel();
        self.supersede();

        if let Err(e) = self.ensure_radio_enabled() {
            warn!(error = %e, "Radio unavailable, connect abandoned");
            let _ = reply.send(Err(ConnectFailure::RadioUnavailable(e.to_string())));
            self.publish();
            return Ok(ticket);
        }

        info!(ssid = %credential.ssid, "Connecting");
        self.attempt = Some(ConnectionAttempt {
            phase: AttemptPhase::Connecting,
            started_at: Instant::now(),
            attempt_index: 0,
            candidates: vec![credential],
            reply: Some(reply),
        });
        self.start_candidate();
        self.publish();
        Ok(ticket)
    }

    /// Scans and tries remembered networks, strongest signal first.
    ///
    /// With nothing remembered the ticket is already resolved and the radio
    /// is not touched.
    pub fn connect_to_remembered(&mut self) -> ConnectTicket {
        let (ticket, reply) = ConnectTicket::channel();

        if self.remembered.is_empty() {
            info!("No remembered networks to connect to");
            let _ = reply.send(Err(ConnectFailure::NoRememberedNetworks));
            return ticket;
        }

        self.supersede();

        if let Err(e) = self.ensure_radio_enabled() {
            warn!(error = %e, "Radio unavailable, reconnect abandoned");
            let _ = reply.send(Err(ConnectFailure::RadioUnavailable(e.to_string())));
            self.publish();
            return ticket;
        }

        info!(remembered = self.remembered.len(), "Scanning for remembered networks");
        self.attempt = Some(ConnectionAttempt {
            phase: AttemptPhase::Scanning,
            started_at: Instant::now(),
            attempt_index: 0,
            candidates: Vec::new(),
            reply: Some(reply),
        });
        self.begin_scan();
        self.poll_scan(Instant::now());
        self.publish();
        ticket
    }

    /// Drops the link and cancels any in-flight request.
    pub fn disconnect(&mut self) {
        if let Some(mut attempt) = self.attempt.take() {
            attempt.resolve(Err(ConnectFailure::Cancelled));
        }
        self.radio.disconnect();
        if let Some(network) = self.connected.take() {
            info!(ssid = %network.ssid, "Disconnected");
        }
        self.last_reconnect = Instant::now();
        self.publish();
    }

    /// Lists visible networks, strongest first.
    pub fn scan(&mut self) -> ScanTicket {
        let (tx, rx) = oneshot::channel();
        self.scan_waiters.push(tx);

        if let Err(e) = self.ensure_radio_enabled() {
            warn!(error = %e, "Radio unavailable for scan");
        }
        self.begin_scan();
        self.poll_scan(Instant::now());
        ScanTicket { rx }
    }

    /// Forgets a remembered network. Returns true if it was remembered.
    pub fn forget(&mut self, ssid: &str) -> bool {
        let removed = self.remembered.forget(ssid);
        if removed {
            info!(ssid, "Forgot network");
            self.persist_remembered();
        }
        removed
    }

    /// Cancels work and powers the radio down.
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.radio.disable();
        self.publish();
        info!("Connection manager stopped");
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advances scans, attempts, drop detection and auto-reconnect.
    pub fn update(&mut self) {
        let now = Instant::now();

        self.poll_scan(now);
        self.advance_attempt(now);

        if self.attempt.is_none() {
            self.watch_link();
            self.maybe_auto_reconnect(now);
        }

        self.publish();
    }

    fn advance_attempt(&mut self, now: Instant) {
        let timeout = self.settings.connect_timeout();

        let step = match &self.attempt {
            None => return,
            Some(attempt) => match attempt.phase {
                AttemptPhase::Scanning => Step::Wait,
                AttemptPhase::Failed => Step::NextCandidate,
                AttemptPhase::Connecting => match self.radio.status() {
                    RadioStatus::Connected => Step::Connected,
                    RadioStatus::ConnectFailed | RadioStatus::NoSsidAvailable => {
                        warn!(
                            ssid = attempt.current_ssid().unwrap_or_default(),
                            attempt = attempt.attempt_index + 1,
                            "Network rejected connection"
                        );
                        Step::CandidateFailed
                    }
                    _ if now.duration_since(attempt.started_at) >= timeout => {
                        warn!(
                            ssid = attempt.current_ssid().unwrap_or_default(),
                            attempt = attempt.attempt_index + 1,
                            timeout_ms = timeout.as_millis() as u64,
                            "Connection attempt timed out"
                        );
                        Step::CandidateFailed
                    }
                    _ => Step::Wait,
                },
            },
        };

        match step {
            Step::Wait => {}
            Step::Connected => self.on_connected(),
            Step::CandidateFailed => {
                self.radio.disconnect();
                if let Some(attempt) = self.attempt.as_mut() {
                    attempt.phase = AttemptPhase::Failed;
                }
            }
            Step::NextCandidate => {
                let exhausted = match self.attempt.as_mut() {
                    Some(attempt) => {
                        attempt.attempt_index += 1;
                        (attempt.attempt_index >= attempt.candidates.len())
                            .then_some(attempt.candidates.len())
                    }
                    None => None,
                };
                match exhausted {
                    Some(tried) => self.finish(Err(ConnectFailure::AttemptsExhausted { tried })),
                    None => self.start_candidate(),
                }
            }
        }
    }

    fn start_candidate(&mut self) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let Some(candidate) = attempt.candidates.get(attempt.attempt_index) else {
            return;
        };
        let ssid = candidate.ssid.clone();
        let password = candidate.password.clone();
        let total = attempt.candidates.len();

        attempt.phase = AttemptPhase::Connecting;
        attempt.started_at = Instant::now();

        if self.connected.take().is_some() {
            self.radio.disconnect();
        }

        info!(ssid = %ssid, attempt = attempt.attempt_index + 1, of = total, "Trying network");
        if let Err(e) = self.radio.begin_connect(&ssid, &password) {
            warn!(ssid = %ssid, error = %e, "Radio failed to start connection");
            attempt.phase = AttemptPhase::Failed;
        }
    }

    fn on_connected(&mut self) {
        let fallback = self
            .attempt
            .as_ref()
            .and_then(|a| a.current_ssid())
            .unwrap_or_default()
            .to_string();

        let network = ConnectedNetwork {
            ssid: self.radio.current_ssid().unwrap_or(fallback),
            rssi: self.radio.rssi(),
            ip: self.radio.local_ip(),
        };
        info!(ssid = %network.ssid, rssi = ?network.rssi, ip = ?network.ip, "Connected");

        self.connected = Some(network.clone());
        self.finish(Ok(network));
    }

    fn finish(&mut self, outcome: ConnectOutcome) {
        if let Some(mut attempt) = self.attempt.take() {
            if let Err(ref failure) = outcome {
                warn!(reason = %failure, "Connection request failed");
            }
            attempt.resolve(outcome);
        }
    }

    fn supersede(&mut self) {
        if let Some(mut attempt) = self.attempt.take() {
            debug!("Superseding in-flight connection request");
            attempt.resolve(Err(ConnectFailure::Superseded));
        }
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    fn begin_scan(&mut self) {
        if self.scan_in_flight {
            return;
        }
        match self.radio.start_scan() {
            Ok(()) => {
                self.scan_in_flight = true;
                self.scan_started_at = Instant::now();
                debug!("Scan started");
            }
            Err(e) => {
                warn!(error = %e, "Scan could not start");
                self.finish_scan(Vec::new());
            }
        }
    }

    fn poll_scan(&mut self, now: Instant) {
        if !self.scan_in_flight {
            return;
        }
        let networks = match self.radio.poll_scan() {
            ScanPoll::Pending => {
                if now.duration_since(self.scan_started_at) < self.settings.connect_timeout() {
                    return;
                }
                warn!("Scan timed out");
                Vec::new()
            }
            ScanPoll::Complete(networks) => networks,
            ScanPoll::Failed => {
                warn!("Scan failed");
                Vec::new()
            }
        };
        self.scan_in_flight = false;
        self.finish_scan(networks);
    }

    /// Delivers results to scan waiters and ranks candidates for a pending
    /// remembered-network attempt.
    fn finish_scan(&mut self, mut networks: Vec<ScannedNetwork>) {
        networks.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        debug!(visible = networks.len(), "Scan complete");

        let ranked = self
            .remembered
            .rank_by_signal(networks.iter().map(|n| (n.ssid.as_str(), n.rssi)));

        if !self.scan_waiters.is_empty() {
            let available: Vec<AvailableNetwork> = networks
                .iter()
                .map(|n| AvailableNetwork {
                    ssid: n.ssid.clone(),
                    rssi: n.rssi,
                    encryption: n.encryption,
                    is_remembered: self.remembered.contains(&n.ssid),
                })
                .collect();
            for waiter in self.scan_waiters.drain(..) {
                let _ = waiter.send(available.clone());
            }
        }

        let scanning = matches!(
            self.attempt.as_ref().map(|a| a.phase),
            Some(AttemptPhase::Scanning)
        );
        if !scanning {
            return;
        }

        let mut candidates = ranked;
        candidates.truncate(self.settings.max_connection_attempts);
        if candidates.is_empty() {
            self.finish(Err(ConnectFailure::NoRememberedNetworks));
            return;
        }

        info!(
            candidates = candidates.len(),
            best = %candidates[0].ssid,
            "Ranked remembered networks"
        );
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.candidates = candidates;
            attempt.attempt_index = 0;
        }
        self.start_candidate();
    }

    // =========================================================================
    // Link Supervision
    // =========================================================================

    /// Notices drops and associations made outside a request.
    fn watch_link(&mut self) {
        let status = self.radio.status();

        match (&self.connected, status) {
            (Some(network), s) if s != RadioStatus::Connected => {
                warn!(ssid = %network.ssid, radio = %s, "Link dropped");
                self.connected = None;
            }
            (None, RadioStatus::Connected) => {
                if let Some(ssid) = self.radio.current_ssid() {
                    info!(ssid = %ssid, "Radio already associated");
                    self.connected = Some(ConnectedNetwork {
                        ssid,
                        rssi: self.radio.rssi(),
                        ip: self.radio.local_ip(),
                    });
                }
            }
            _ => {}
        }

        if let Some(network) = self.connected.as_mut() {
            network.rssi = self.radio.rssi();
        }
    }

    fn maybe_auto_reconnect(&mut self, now: Instant) {
        if !self.auto_reconnect || self.connected.is_some() || self.remembered.is_empty() {
            return;
        }
        if self.radio.status() == RadioStatus::Connected {
            return;
        }
        if now.duration_since(self.last_reconnect) < self.settings.reconnect_interval() {
            return;
        }

        self.last_reconnect = now;
        info!("Auto-reconnecting to remembered networks");
        // Outcome is observed through the link status.
        drop(self.connect_to_remembered());
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn ensure_radio_enabled(&mut self) -> SyncResult<()> {
        if !self.radio.is_enabled() {
            self.radio.enable()?;
            info!("Radio enabled");
        }
        Ok(())
    }

    fn persist_remembered(&mut self) {
        if let Err(e) = self.credentials.save(&self.remembered) {
            warn!(error = %e, "Failed to persist remembered networks");
        }
    }

    fn publish(&mut self) {
        let status = LinkStatus {
            phase: self.phase(),
            connected: self.connected.is_some(),
            ssid: self.connected.as_ref().map(|n| n.ssid.clone()),
            rssi: self.connected.as_ref().and_then(|n| n.rssi),
            ip: self.connected.as_ref().and_then(|n| n.ip),
        };

        self.link_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            if current.phase != status.phase {
                debug!(from = %current.phase, to = %status.phase, "Link phase changed");
            }
            *current = status;
            true
        });
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(mut attempt) = self.attempt.take() {
            attempt.resolve(Err(ConnectFailure::Abandoned));
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vigil_store::{MemorySettings, SettingsStore};

    use crate::link::Connectivity;
    use crate::radio::SimulatedRadio;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn cred(ssid: &str, password: &str) -> NetworkCredential {
        NetworkCredential::new(ssid, password).unwrap()
    }

    fn remember(settings: &MemorySettings, networks: &[(&str, &str)], max: usize) {
        let mut list = RememberedNetworks::new(max);
        for (ssid, password) in networks {
            list.upsert(cred(ssid, password));
        }
        let mut repo = CredentialRepository::new(Box::new(settings.clone()), max);
        repo.save(&list).unwrap();
    }

    fn manager(radio: &SimulatedRadio, settings: &MemorySettings, wifi: WifiSettings) -> ConnectionManager {
        let repo = CredentialRepository::new(Box::new(settings.clone()), wifi.max_networks);
        ConnectionManager::init(Box::new(radio.clone()), repo, wifi)
    }

    /// Ticks until the ticket resolves, advancing the clock by `step` each time.
    async fn drive(
        manager: &mut ConnectionManager,
        ticket: &mut ConnectTicket,
        step: Duration,
        max_ticks: usize,
    ) -> ConnectOutcome {
        for _ in 0..max_ticks {
            if let Some(outcome) = ticket.try_outcome() {
                return outcome;
            }
            tokio::time::advance(step).await;
            manager.update();
        }
        panic!("connection request did not resolve");
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_rejects_invalid_credentials_without_radio_activity() {
        let radio = SimulatedRadio::new();
        let settings = MemorySettings::new();
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let empty_ssid = NetworkCredential {
            ssid: String::new(),
            password: "pw".into(),
            last_known_signal: None,
            is_remembered: false,
        };
        let err = manager.connect(empty_ssid, true).unwrap_err();
        assert!(err.is_config_error());

        let empty_password = NetworkCredential {
            ssid: "Backroom".into(),
            password: String::new(),
            last_known_signal: None,
            is_remembered: false,
        };
        assert!(manager.connect(empty_password, true).is_err());

        assert!(radio.connect_attempts().is_empty());
        assert!(!radio.is_enabled());
        assert!(settings.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_remembers_and_reports_connected() {
        let radio = SimulatedRadio::new();
        radio.add_visible("Backroom", -52).make_reachable("Backroom", "pw-1");
        let settings = MemorySettings::new();
        let mut manager = manager(&radio, &settings, WifiSettings::default());
        let link = manager.link_handle();

        let mut ticket = manager.connect(cred("Backroom", "pw-1"), true).unwrap();
        assert_eq!(manager.phase(), ConnectionPhase::Connecting);

        let network = drive(&mut manager, &mut ticket, Duration::from_millis(100), 5)
            .await
            .unwrap();

        assert_eq!(network.ssid, "Backroom");
        assert_eq!(network.rssi, Some(-52));
        assert!(manager.is_connected());
        assert!(link.is_connected());
        assert_eq!(manager.current_rssi(), Some(-52));
        assert_eq!(settings.get_int("wifi", "count").unwrap(), Some(1));
        assert_eq!(
            settings.get_string("wifi", "ssid0").unwrap().as_deref(),
            Some("Backroom")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_remembered_networks_fails_without_radio_activity() {
        let radio = SimulatedRadio::new();
        let mut manager = manager(&radio, &MemorySettings::new(), WifiSettings::default());

        let mut ticket = manager.connect_to_remembered();

        assert_eq!(
            ticket.try_outcome(),
            Some(Err(ConnectFailure::NoRememberedNetworks))
        );
        assert_eq!(radio.scans_started(), 0);
        assert!(radio.connect_attempts().is_empty());
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stronger_network_attempted_first() {
        let radio = SimulatedRadio::new();
        radio.add_visible("B", -70).add_visible("A", -40);
        let settings = MemorySettings::new();
        remember(&settings, &[("B", "pw-b"), ("A", "pw-a")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.connect_to_remembered();
        let outcome = drive(&mut manager, &mut ticket, TIMEOUT, 10).await;

        assert_eq!(radio.connect_attempts(), vec!["A", "B"]);
        assert_eq!(outcome, Err(ConnectFailure::AttemptsExhausted { tried: 2 }));

        let saved = manager.remembered_networks();
        let a = saved.iter().find(|n| n.ssid == "A").unwrap();
        assert_eq!(a.last_known_signal, Some(-40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reachable_top_candidate_connects_without_trying_others() {
        let radio = SimulatedRadio::new();
        radio.add_visible("B", -70).add_visible("A", -40);
        radio.make_reachable("A", "pw-a").make_reachable("B", "pw-b");
        let settings = MemorySettings::new();
        remember(&settings, &[("B", "pw-b"), ("A", "pw-a")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.connect_to_remembered();
        let network = drive(&mut manager, &mut ticket, Duration::from_millis(100), 5)
            .await
            .unwrap();

        assert_eq!(network.ssid, "A");
        assert_eq!(radio.connect_attempts(), vec!["A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_network_advances_to_next_candidate() {
        let radio = SimulatedRadio::new();
        radio.add_visible("B", -70).add_visible("A", -40);
        radio.make_reachable("A", "right").make_reachable("B", "pw-b");
        let settings = MemorySettings::new();
        remember(&settings, &[("A", "wrong"), ("B", "pw-b")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        // Steps far shorter than the timeout: only the rejection can advance.
        let mut ticket = manager.connect_to_remembered();
        let network = drive(&mut manager, &mut ticket, Duration::from_millis(100), 5)
            .await
            .unwrap();

        assert_eq!(radio.connect_attempts(), vec!["A", "B"]);
        assert_eq!(network.ssid, "B");
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_connect_error_counts_as_failed_candidate() {
        let radio = SimulatedRadio::new();
        radio.add_visible("A", -40).add_visible("B", -70);
        radio.fail_connects(true);
        let settings = MemorySettings::new();
        remember(&settings, &[("A", "pw-a"), ("B", "pw-b")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.connect_to_remembered();
        assert_eq!(manager.phase(), ConnectionPhase::Failed);

        let outcome = drive(&mut manager, &mut ticket, Duration::from_millis(100), 5).await;
        assert_eq!(outcome, Err(ConnectFailure::AttemptsExhausted { tried: 2 }));
        assert_eq!(radio.connect_attempts(), vec!["A", "B"]);
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_stays_online_while_associated_manager_rescans() {
        let radio = SimulatedRadio::new();
        radio.add_visible("A", -45).make_reachable("A", "pw-a");
        let settings = MemorySettings::new();
        remember(&settings, &[("A", "pw-a")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());
        let link = manager.link_handle();

        let mut first = manager.connect_to_remembered();
        drive(&mut manager, &mut first, Duration::from_millis(100), 5)
            .await
            .unwrap();
        assert!(link.is_connected());

        radio.defer_scans(3);
        let mut second = manager.connect_to_remembered();
        assert_eq!(manager.phase(), ConnectionPhase::Scanning);
        assert!(manager.is_connected());
        assert_eq!(link.is_connected(), manager.is_connected());
        assert_eq!(link.status().phase, ConnectionPhase::Scanning);

        drive(&mut manager, &mut second, Duration::from_millis(100), 10)
            .await
            .unwrap();
        assert_eq!(link.is_connected(), manager.is_connected());
        assert!(link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_advances_and_ceiling_bounds_candidates() {
        let radio = SimulatedRadio::new();
        let settings = MemorySettings::new();
        let networks = [("N1", "pw"), ("N2", "pw"), ("N3", "pw"), ("N4", "pw"), ("N5", "pw"), ("N6", "pw")];
        remember(&settings, &networks, 6);
        let wifi = WifiSettings {
            max_networks: 6,
            ..Default::default()
        };
        let mut manager = manager(&radio, &settings, wifi);

        let mut ticket = manager.connect_to_remembered();
        assert_eq!(radio.connect_attempts().len(), 1);

        // Not yet timed out.
        tokio::time::advance(TIMEOUT - Duration::from_millis(100)).await;
        manager.update();
        assert_eq!(manager.phase(), ConnectionPhase::Connecting);
        assert_eq!(radio.connect_attempts().len(), 1);

        tokio::time::advance(Duration::from_millis(100)).await;
        manager.update();
        assert_eq!(manager.phase(), ConnectionPhase::Failed);
        manager.update();
        assert_eq!(manager.phase(), ConnectionPhase::Connecting);
        assert_eq!(radio.connect_attempts().len(), 2);

        let outcome = drive(&mut manager, &mut ticket, TIMEOUT, 20).await;
        assert_eq!(outcome, Err(ConnectFailure::AttemptsExhausted { tried: 5 }));
        assert_eq!(radio.connect_attempts(), vec!["N1", "N2", "N3", "N4", "N5"]);
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
        assert!(!manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_scan_completes_on_later_tick() {
        let radio = SimulatedRadio::new();
        radio.add_visible("Floor", -60).make_reachable("Floor", "pw");
        radio.defer_scans(2);
        let settings = MemorySettings::new();
        remember(&settings, &[("Floor", "pw")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.connect_to_remembered();
        assert_eq!(manager.phase(), ConnectionPhase::Scanning);
        assert!(ticket.try_outcome().is_none());

        let network = drive(&mut manager, &mut ticket, Duration::from_millis(100), 10)
            .await
            .unwrap();
        assert_eq!(network.ssid, "Floor");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scan_still_tries_remembered_networks() {
        let radio = SimulatedRadio::new();
        radio.make_reachable("Floor", "pw");
        radio.fail_scans(true);
        let settings = MemorySettings::new();
        remember(&settings, &[("Floor", "pw")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.connect_to_remembered();
        let network = drive(&mut manager, &mut ticket, Duration::from_millis(100), 5)
            .await
            .unwrap();
        assert_eq!(network.ssid, "Floor");
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_request_supersedes_older() {
        let radio = SimulatedRadio::new();
        radio.make_reachable("Backroom", "pw");
        let mut manager = manager(&radio, &MemorySettings::new(), WifiSettings::default());

        let mut first = manager.connect(cred("Nowhere", "pw"), false).unwrap();
        let mut second = manager.connect(cred("Backroom", "pw"), false).unwrap();

        assert_eq!(first.try_outcome(), Some(Err(ConnectFailure::Superseded)));
        manager.update();
        assert!(second.try_outcome().unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_radio_enable_failure_resolves_ticket() {
        let radio = SimulatedRadio::new();
        radio.fail_enable(true);
        let mut manager = manager(&radio, &MemorySettings::new(), WifiSettings::default());

        let mut ticket = manager.connect(cred("Backroom", "pw"), false).unwrap();
        assert!(matches!(
            ticket.try_outcome(),
            Some(Err(ConnectFailure::RadioUnavailable(_)))
        ));
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_drop_returns_to_idle_and_auto_reconnect_waits_for_interval() {
        let radio = SimulatedRadio::new();
        radio.add_visible("Floor", -55).make_reachable("Floor", "pw");
        let settings = MemorySettings::new();
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.connect(cred("Floor", "pw"), true).unwrap();
        drive(&mut manager, &mut ticket, Duration::from_millis(100), 5)
            .await
            .unwrap();
        let scans_before = radio.scans_started();

        radio.drop_link();
        tokio::time::advance(Duration::from_secs(1)).await;
        manager.update();
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
        assert!(!manager.link_handle().is_connected());

        // Interval counted from construction: 300 s have not passed yet.
        tokio::time::advance(Duration::from_secs(200)).await;
        manager.update();
        assert_eq!(radio.scans_started(), scans_before);

        tokio::time::advance(Duration::from_secs(100)).await;
        manager.update();
        assert_eq!(radio.scans_started(), scans_before + 1);

        manager.update();
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reconnect_disabled() {
        let radio = SimulatedRadio::new();
        radio.make_reachable("Floor", "pw");
        let settings = MemorySettings::new();
        remember(&settings, &[("Floor", "pw")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());
        manager.set_auto_reconnect(false);

        tokio::time::advance(Duration::from_secs(600)).await;
        manager.update();
        assert_eq!(radio.scans_started(), 0);
        assert!(!manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_sorted_and_flags_remembered() {
        let radio = SimulatedRadio::new();
        radio.add_visible("Guest", -80).add_visible("Floor", -45).add_visible("Office", -60);
        let settings = MemorySettings::new();
        remember(&settings, &[("Office", "pw")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        let mut ticket = manager.scan();
        let networks = ticket.try_networks().unwrap();

        let ssids: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["Floor", "Office", "Guest"]);
        assert!(networks[1].is_remembered);
        assert!(!networks[0].is_remembered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_persists() {
        let radio = SimulatedRadio::new();
        let settings = MemorySettings::new();
        remember(&settings, &[("A", "pw"), ("B", "pw")], 5);
        let mut manager = manager(&radio, &settings, WifiSettings::default());

        assert!(manager.forget("A"));
        assert!(!manager.forget("A"));
        assert_eq!(settings.get_int("wifi", "count").unwrap(), Some(1));
        assert_eq!(settings.get_string("wifi", "ssid0").unwrap().as_deref(), Some("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_attempt() {
        let radio = SimulatedRadio::new();
        let mut manager = manager(&radio, &MemorySettings::new(), WifiSettings::default());

        let mut ticket = manager.connect(cred("Nowhere", "pw"), false).unwrap();
        manager.disconnect();

        assert_eq!(ticket.try_outcome(), Some(Err(ConnectFailure::Cancelled)));
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }
}
