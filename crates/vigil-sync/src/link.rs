//! # Link Status
//!
//! Read-only view of the wireless link for components that do not own the
//! radio.
//!
//! ```text
//!  ConnectionManager ── publishes ──► watch::Sender<LinkStatus>
//!                                            │
//!               ┌────────────────────────────┼──────────────────────┐
//!               ▼                            ▼                      ▼
//!          LinkHandle                   LinkHandle             LinkHandle
//!       (DeliveryQueue)            (SyncCoordinator)          (status UI)
//! ```
//!
//! Consumers query [`Connectivity::is_connected`] when they need it; nothing
//! subscribes to change events.

use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

// =============================================================================
// Connection Phase
// =============================================================================

/// Where the connection manager is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Connected,
    /// The current candidate failed; the next one starts on the next tick.
    Failed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Idle => write!(f, "idle"),
            ConnectionPhase::Scanning => write!(f, "scanning"),
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
            ConnectionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of the wireless link.
///
/// `connected` stays true while an associated manager runs a new scan or
/// connect, so `phase` alone does not say whether the device is online.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub phase: ConnectionPhase,
    pub connected: bool,
    pub ssid: Option<String>,
    pub rssi: Option<i8>,
    pub ip: Option<IpAddr>,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

// =============================================================================
// Connectivity Trait
// =============================================================================

/// Answers "is the device online right now?".
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Cloneable reader of the link published by the connection manager.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    rx: watch::Receiver<LinkStatus>,
}

impl LinkHandle {
    pub(crate) fn new(rx: watch::Receiver<LinkStatus>) -> Self {
        LinkHandle { rx }
    }

    /// Latest published status.
    pub fn status(&self) -> LinkStatus {
        self.rx.borrow().clone()
    }
}

impl Connectivity for LinkHandle {
    fn is_connected(&self) -> bool {
        self.rx.borrow().is_connected()
    }
}

/// Connectivity flag set by hand.
///
/// For hosts where the network is managed outside this crate.
#[derive(Debug, Clone, Default)]
pub struct ManualLink {
    connected: Arc<AtomicBool>,
}

impl ManualLink {
    pub fn new(connected: bool) -> Self {
        ManualLink {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for ManualLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
