//! # Vigil Device
//!
//! Host build of the logger's connectivity loop.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  vigil-device [config.toml]                                             │
//! │                                                                         │
//! │  1. tracing (RUST_LOG, default info)                                    │
//! │  2. VigilConfig: defaults → file → VIGIL_* env                         │
//! │  3. <data_dir>/settings.toml       remembered networks                  │
//! │     <data_dir>/offline_queue.json  delivery queue                       │
//! │  4. DeviceAgent::run until Ctrl+C / SIGTERM                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The host has no radio hardware; the simulated radio stands in for it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vigil_store::{FileSettings, JsonFileQueueStore};
use vigil_sync::{AgentHandle, DeviceAgent, ReqwestTransport, SimulatedRadio, VigilConfig};

/// Settings file inside the data directory.
const SETTINGS_FILE_NAME: &str = "settings.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = VigilConfig::load_or_default(config_path);

    let data_dir = config.data_dir();
    info!(
        device_id = %config.device_id(),
        data_dir = %data_dir.display(),
        "Starting Vigil device"
    );

    let settings = FileSettings::open(data_dir.join(SETTINGS_FILE_NAME));
    let queue_store = JsonFileQueueStore::in_dir(&data_dir);
    let transport = ReqwestTransport::new(config.api.request_timeout())
        .context("failed to build HTTP transport")?;

    let mut agent = DeviceAgent::init(
        config,
        Box::new(SimulatedRadio::new()),
        Box::new(settings),
        Box::new(queue_store),
        Arc::new(transport),
    )
    .context("failed to initialise device agent")?;

    let (handle, shutdown_rx) = AgentHandle::channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.shutdown().await;
    });

    agent.run(shutdown_rx).await;

    info!("Vigil device stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=vigil_sync=trace` - Trace the sync engine only
/// - Default: INFO level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
