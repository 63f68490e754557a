//! # Device Configuration
//!
//! Configuration for connectivity, delivery and sync.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VIGIL_DEVICE_ID, VIGIL_WEBHOOK_URL, VIGIL_API_URL,                 │
//! │     VIGIL_API_KEY, VIGIL_AUTO_RECONNECT, VIGIL_DATA_DIR                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/vigil/vigil.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.vigil.device/vigil.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Generated device id, 5 networks, 10 s connect timeout, ...         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Handheld 3"
//!
//! [wifi]
//! max_networks = 5
//! connect_timeout_ms = 10000
//! max_connection_attempts = 5
//! reconnect_interval_secs = 300
//! auto_reconnect = true
//!
//! [delivery]
//! max_retries = 5
//! retry_interval_secs = 60
//! auto_process = true
//!
//! [sync]
//! webhook_url = "https://hooks.example.com/lp"
//! auto_sync = true
//! retry_interval_secs = 60
//!
//! [api]
//! base_url = "https://api.example.com/v1"
//! api_key = "..."
//! request_timeout_ms = 10000
//!
//! [runtime]
//! tick_interval_ms = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use vigil_core::DEFAULT_MAX_REMEMBERED;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this handheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    #[serde(default = "generate_device_id")]
    pub id: String,

    /// Human-readable name (e.g., "Handheld 3").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn generate_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "Loss Prevention Logger".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: generate_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Wi-Fi Settings
// =============================================================================

/// Connection manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiSettings {
    /// Remembered networks kept in settings storage.
    #[serde(default = "default_max_networks")]
    pub max_networks: usize,

    /// Time allowed for one candidate to reach Connected (milliseconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Most candidates tried per connection request.
    #[serde(default = "default_max_attempts")]
    pub max_connection_attempts: usize,

    /// Minimum time between automatic reconnect attempts (seconds).
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// Reconnect to remembered networks after a drop.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
}

fn default_max_networks() -> usize {
    DEFAULT_MAX_REMEMBERED
}
fn default_connect_timeout() -> u64 {
    10_000
}
fn default_max_attempts() -> usize {
    5
}
fn default_reconnect_interval() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for WifiSettings {
    fn default() -> Self {
        WifiSettings {
            max_networks: default_max_networks(),
            connect_timeout_ms: default_connect_timeout(),
            max_connection_attempts: default_max_attempts(),
            reconnect_interval_secs: default_reconnect_interval(),
            auto_reconnect: true,
        }
    }
}

impl WifiSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

// =============================================================================
// Delivery Settings
// =============================================================================

/// Delivery queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Failed attempts after which an item is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum time between automatic drains (seconds).
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    #[serde(default = "default_true")]
    pub auto_process: bool,
}

fn default_max_retries() -> u32 {
    5
}
fn default_retry_interval() -> u64 {
    60
}

impl Default for DeliverySettings {
    fn default() -> Self {
        DeliverySettings {
            max_retries: default_max_retries(),
            retry_interval_secs: default_retry_interval(),
            auto_process: true,
        }
    }
}

impl DeliverySettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Record sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Webhook receiving synced records.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Minimum time between automatic sync passes (seconds).
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            webhook_url: None,
            auto_sync: true,
            retry_interval_secs: default_retry_interval(),
        }
    }
}

impl SyncSettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

// =============================================================================
// API Settings
// =============================================================================

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; endpoints such as `/logs` are appended.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Sent as `X-API-Key`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: None,
            api_key: None,
            bearer_token: None,
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// =============================================================================
// Runtime Settings
// =============================================================================

/// Poll loop and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Period of the device poll loop (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Directory for settings and the queue file.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_tick_interval() -> u64 {
    100
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            tick_interval_ms: default_tick_interval(),
            data_dir: None,
        }
    }
}

impl RuntimeSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub wifi: WifiSettings,

    #[serde(default)]
    pub delivery: DeliverySettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub runtime: RuntimeSettings,
}

impl VigilConfig {
    /// Creates a config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (vigil.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("device id must not be empty".into()));
        }

        if let Some(ref url) = self.sync.webhook_url {
            validate_http_url(url)?;
        }
        if let Some(ref url) = self.api.base_url {
            validate_http_url(url)?;
        }

        let positive = [
            ("wifi.max_networks", self.wifi.max_networks as u64),
            ("wifi.connect_timeout_ms", self.wifi.connect_timeout_ms),
            (
                "wifi.max_connection_attempts",
                self.wifi.max_connection_attempts as u64,
            ),
            ("delivery.max_retries", self.delivery.max_retries as u64),
            ("api.request_timeout_ms", self.api.request_timeout_ms),
            ("runtime.tick_interval_ms", self.runtime.tick_interval_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Applies overrides from the process environment.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("VIGIL_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(url) = lookup("VIGIL_WEBHOOK_URL") {
            debug!(url = %url, "Overriding webhook URL from environment");
            self.sync.webhook_url = Some(url);
        }

        if let Some(url) = lookup("VIGIL_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = Some(url);
        }

        if let Some(key) = lookup("VIGIL_API_KEY") {
            self.api.api_key = Some(key);
        }

        if let Some(flag) = lookup("VIGIL_AUTO_RECONNECT") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.wifi.auto_reconnect = true,
                "0" | "false" | "no" | "off" => self.wifi.auto_reconnect = false,
                _ => warn!(value = %flag, "Unknown VIGIL_AUTO_RECONNECT value"),
            }
        }

        if let Some(dir) = lookup("VIGIL_DATA_DIR") {
            self.runtime.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "vigil", "device")
            .map(|dirs| dirs.config_dir().join("vigil.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Directory holding settings and the queue file.
    ///
    /// Falls back to the platform data directory, then `./vigil-data`.
    pub fn data_dir(&self) -> PathBuf {
        self.runtime
            .data_dir
            .clone()
            .or_else(|| {
                directories::ProjectDirs::from("com", "vigil", "device")
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from("vigil-data"))
    }
}

/// Accepts only absolute `http` and `https` URLs.
pub fn validate_http_url(raw: &str) -> SyncResult<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl(format!(
            "URL must use http or https, got {}: {}",
            other, raw
        ))),
    }
}
