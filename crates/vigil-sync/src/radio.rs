//! # Radio Adapter
//!
//! The seam between the connection manager and the wireless hardware.
//!
//! ## Call Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ConnectionManager ──► RadioAdapter                   │
//! │                                                                         │
//! │  enable()          power the radio up (idempotent)                     │
//! │  start_scan()      kick off an asynchronous scan                       │
//! │  poll_scan()       Pending | Complete(networks) | Failed               │
//! │  begin_connect()   start associating, returns immediately              │
//! │  status()          polled each tick until Connected / failure          │
//! │  disconnect()      drop the association                                │
//! │                                                                         │
//! │  Every call is non-blocking. Progress is observed by polling from      │
//! │  ConnectionManager::update().                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`SimulatedRadio`] is a scripted implementation for host runs and tests.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Radio Types
// =============================================================================

/// Link security advertised by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Unknown,
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encryption::Open => "open",
            Encryption::Wep => "wep",
            Encryption::WpaPsk => "wpa-psk",
            Encryption::Wpa2Psk => "wpa2-psk",
            Encryption::WpaWpa2Psk => "wpa/wpa2-psk",
            Encryption::Wpa2Enterprise => "wpa2-enterprise",
            Encryption::Wpa3Psk => "wpa3-psk",
            Encryption::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// One access point seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedNetwork {
    pub ssid: String,
    /// Signal strength in dBm.
    pub rssi: i8,
    pub encryption: Encryption,
}

impl ScannedNetwork {
    pub fn new(ssid: impl Into<String>, rssi: i8, encryption: Encryption) -> Self {
        ScannedNetwork {
            ssid: ssid.into(),
            rssi,
            encryption,
        }
    }
}

/// Progress of a scan started with [`RadioAdapter::start_scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPoll {
    Pending,
    Complete(Vec<ScannedNetwork>),
    Failed,
}

/// Association state reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioStatus {
    Idle,
    Connecting,
    Connected,
    /// The access point rejected the association (bad password, ...).
    ConnectFailed,
    /// The requested SSID is not in range.
    NoSsidAvailable,
    Disconnected,
}

impl fmt::Display for RadioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioStatus::Idle => write!(f, "idle"),
            RadioStatus::Connecting => write!(f, "connecting"),
            RadioStatus::Connected => write!(f, "connected"),
            RadioStatus::ConnectFailed => write!(f, "connect_failed"),
            RadioStatus::NoSsidAvailable => write!(f, "no_ssid_available"),
            RadioStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

// =============================================================================
// Radio Adapter Trait
// =============================================================================

/// Wireless radio driver.
///
/// Owned exclusively by the connection manager.
pub trait RadioAdapter: Send {
    fn enable(&mut self) -> SyncResult<()>;

    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    fn start_scan(&mut self) -> SyncResult<()>;

    fn poll_scan(&mut self) -> ScanPoll;

    fn begin_connect(&mut self, ssid: &str, password: &str) -> SyncResult<()>;

    fn disconnect(&mut self);

    fn status(&self) -> RadioStatus;

    fn current_ssid(&self) -> Option<String>;

    fn rssi(&self) -> Option<i8>;

    fn local_ip(&self) -> Option<IpAddr>;
}

// =============================================================================
// Simulated Radio
// =============================================================================

#[derive(Debug, Default)]
struct SimulatedState {
    enabled: bool,
    fail_enable: bool,
    visible: Vec<ScannedNetwork>,
    /// SSID → password accepted by that access point.
    reachable: HashMap<String, String>,
    scan_in_progress: bool,
    scan_polls_remaining: u32,
    scan_delay_polls: u32,
    fail_scan: bool,
    fail_connect: bool,
    status: Option<RadioStatus>,
    connected_ssid: Option<String>,
    scans_started: usize,
    connect_attempts: Vec<String>,
}

/// Deterministic radio for host runs and tests.
///
/// Clones share state, so a test can keep a handle to script the radio
/// after handing a boxed clone to the connection manager.
///
/// ## Behavior
/// - A scan completes on the first `poll_scan` unless a delay is set with
///   [`defer_scans`](Self::defer_scans)
/// - `begin_connect` to a reachable SSID with the right password reaches
///   `Connected` on the next `status()` call
/// - A wrong password reports `ConnectFailed`
/// - [`fail_connects`](Self::fail_connects) makes `begin_connect` itself
///   return an error, after recording the attempt
/// - An unreachable SSID stays in `Connecting` forever, so the caller's
///   timeout is what ends the attempt
#[derive(Debug, Clone, Default)]
pub struct SimulatedRadio {
    inner: Arc<Mutex<SimulatedState>>,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an access point to scan results.
    pub fn add_visible(&self, ssid: &str, rssi: i8) -> &Self {
        self.lock()
            .visible
            .push(ScannedNetwork::new(ssid, rssi, Encryption::Wpa2Psk));
        self
    }

    /// Makes `ssid` accept connections with `password`.
    pub fn make_reachable(&self, ssid: &str, password: &str) -> &Self {
        self.lock()
            .reachable
            .insert(ssid.to_string(), password.to_string());
        self
    }

    /// Scans report `Pending` for `polls` calls before completing.
    pub fn defer_scans(&self, polls: u32) {
        self.lock().scan_delay_polls = polls;
    }

    pub fn fail_scans(&self, fail: bool) {
        self.lock().fail_scan = fail;
    }

    pub fn fail_connects(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn fail_enable(&self, fail: bool) {
        self.lock().fail_enable = fail;
    }

    /// Drops the current association as if the access point vanished.
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.connected_ssid = None;
        state.status = Some(RadioStatus::Disconnected);
    }

    pub fn scans_started(&self) -> usize {
        self.lock().scans_started
    }

    /// SSIDs passed to `begin_connect`, in call order.
    pub fn connect_attempts(&self) -> Vec<String> {
        self.lock().connect_attempts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RadioAdapter for SimulatedRadio {
    fn enable(&mut self) -> SyncResult<()> {
        let mut state = self.lock();
        if state.fail_enable {
            return Err(SyncError::Radio("radio failed to power up".into()));
        }
        state.enabled = true;
        Ok(())
    }

    fn disable(&mut self) {
        let mut state = self.lock();
        state.enabled = false;
        state.connected_ssid = None;
        state.status = Some(RadioStatus::Idle);
    }

    fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    fn start_scan(&mut self) -> SyncResult<()> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(SyncError::Radio("scan requested while radio is off".into()));
        }
        state.scans_started += 1;
        state.scan_in_progress = true;
        state.scan_polls_remaining = state.scan_delay_polls;
        Ok(())
    }

    fn poll_scan(&mut self) -> ScanPoll {
        let mut state = self.lock();
        if !state.scan_in_progress {
            return ScanPoll::Failed;
        }
        if state.scan_polls_remaining > 0 {
            state.scan_polls_remaining -= 1;
            return ScanPoll::Pending;
        }
        state.scan_in_progress = false;
        if state.fail_scan {
            ScanPoll::Failed
        } else {
            ScanPoll::Complete(state.visible.clone())
        }
    }

    fn begin_connect(&mut self, ssid: &str, password: &str) -> SyncResult<()> {
        let mut state = self.lock();
        if !state.enabled {
            return Err(SyncError::Radio("connect requested while radio is off".into()));
        }
        state.connect_attempts.push(ssid.to_string());
        if state.fail_connect {
            state.status = Some(RadioStatus::Idle);
            return Err(SyncError::Radio(format!("driver refused to join {}", ssid)));
        }
        state.connected_ssid = None;
        state.status = Some(RadioStatus::Connecting);

        // Resolve the association right away; status() then reports it.
        let accepted = state.reachable.get(ssid).map(|pwd| pwd == password);
        match accepted {
            Some(true) => {
                state.connected_ssid = Some(ssid.to_string());
                state.status = Some(RadioStatus::Connected);
            }
            Some(false) => state.status = Some(RadioStatus::ConnectFailed),
            None => {}
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.lock();
        state.connected_ssid = None;
        state.status = Some(RadioStatus::Disconnected);
    }

    fn status(&self) -> RadioStatus {
        let state = self.lock();
        if !state.enabled {
            return RadioStatus::Idle;
        }
        state.status.unwrap_or(RadioStatus::Idle)
    }

    fn current_ssid(&self) -> Option<String> {
        self.lock().connected_ssid.clone()
    }

    fn rssi(&self) -> Option<i8> {
        let state = self.lock();
        let ssid = state.connected_ssid.as_ref()?;
        state
            .visible
            .iter()
            .filter(|n| &n.ssid == ssid)
            .map(|n| n.rssi)
            .max()
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.lock()
            .connected_ssid
            .as_ref()
            .map(|_| IpAddr::V4(Ipv4Addr::new(192, 168, 4, 20)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_connect_paths() {
        let handle = SimulatedRadio::new();
        handle.add_visible("Backroom", -48);
        handle.make_reachable("Backroom", "pw");

        let mut radio = handle.clone();
        radio.enable().unwrap();

        radio.begin_connect("Backroom", "wrong").unwrap();
        assert_eq!(radio.status(), RadioStatus::ConnectFailed);

        radio.begin_connect("Elsewhere", "pw").unwrap();
        assert_eq!(radio.status(), RadioStatus::Connecting);

        radio.begin_connect("Backroom", "pw").unwrap();
        assert_eq!(radio.status(), RadioStatus::Connected);
        assert_eq!(radio.current_ssid().as_deref(), Some("Backroom"));
        assert_eq!(radio.rssi(), Some(-48));
        assert!(radio.local_ip().is_some());

        handle.drop_link();
        assert_eq!(radio.status(), RadioStatus::Disconnected);
        assert_eq!(handle.connect_attempts(), vec!["Backroom", "Elsewhere", "Backroom"]);
    }

    #[test]
    fn test_failing_begin_connect_is_recorded() {
        let handle = SimulatedRadio::new();
        handle.make_reachable("Backroom", "pw");
        handle.fail_connects(true);

        let mut radio = handle.clone();
        radio.enable().unwrap();

        assert!(radio.begin_connect("Backroom", "pw").is_err());
        assert_eq!(radio.status(), RadioStatus::Idle);
        assert_eq!(handle.connect_attempts(), vec!["Backroom"]);
    }

    #[test]
    fn test_deferred_scan() {
        let handle = SimulatedRadio::new();
        handle.add_visible("A", -60);
        handle.defer_scans(2);

        let mut radio = handle.clone();
        assert!(radio.start_scan().is_err());

        radio.enable().unwrap();
        radio.start_scan().unwrap();
        assert_eq!(radio.poll_scan(), ScanPoll::Pending);
        assert_eq!(radio.poll_scan(), ScanPoll::Pending);
        assert!(matches!(radio.poll_scan(), ScanPoll::Complete(ref n) if n.len() == 1));
        assert_eq!(handle.scans_started(), 1);
    }
}
