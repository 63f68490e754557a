//! # Credential Repository
//!
//! Persists the remembered-network list in the `wifi` settings namespace.
//!
//! ## Key Layout
//! ```text
//! wifi.count   = N            (at most the configured maximum)
//! wifi.ssid{i} = "<ssid>"     for i in 0..N
//! wifi.pwd{i}  = "<password>"
//! ```
//!
//! Saving writes the slots first, then `count`, then clears slots left over
//! from a longer list. An interrupted save leaves `count` pointing only at
//! complete slots.

use tracing::{debug, warn};

use vigil_core::{NetworkCredential, RememberedNetworks};

use crate::error::StoreResult;
use crate::settings::SettingsStore;

/// Settings namespace holding remembered networks.
pub const WIFI_NAMESPACE: &str = "wifi";

/// Loads and saves [`RememberedNetworks`] through a [`SettingsStore`].
pub struct CredentialRepository {
    store: Box<dyn SettingsStore>,
    max_networks: usize,
}

impl CredentialRepository {
    pub fn new(store: Box<dyn SettingsStore>, max_networks: usize) -> Self {
        CredentialRepository {
            store,
            max_networks,
        }
    }

    pub fn max_networks(&self) -> usize {
        self.max_networks
    }

    /// Loads the remembered list.
    ///
    /// Slots with a missing SSID, or an SSID/password that no longer passes
    /// validation, are skipped with a warning.
    pub fn load(&self) -> StoreResult<RememberedNetworks> {
        let count = self
            .store
            .get_int(WIFI_NAMESPACE, "count")?
            .unwrap_or(0)
            .clamp(0, self.max_networks as i64) as usize;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let ssid = self.store.get_string(WIFI_NAMESPACE, &ssid_key(i))?;
            let password = self.store.get_string(WIFI_NAMESPACE, &pwd_key(i))?;

            let Some(ssid) = ssid else {
                warn!(slot = i, "Remembered network slot has no SSID, skipping");
                continue;
            };

            match NetworkCredential::new(ssid, password.unwrap_or_default()) {
                Ok(credential) => entries.push(credential),
                Err(e) => warn!(slot = i, error = %e, "Invalid remembered network, skipping"),
            }
        }

        debug!(count = entries.len(), "Loaded remembered networks");
        Ok(RememberedNetworks::from_entries(entries, self.max_networks))
    }

    /// Rewrites the remembered list.
    pub fn save(&mut self, networks: &RememberedNetworks) -> StoreResult<()> {
        let previous = self
            .store
            .get_int(WIFI_NAMESPACE, "count")?
            .unwrap_or(0)
            .max(0) as usize;

        let saved: Vec<&NetworkCredential> = networks.iter().take(self.max_networks).collect();

        for (i, credential) in saved.iter().enumerate() {
            self.store
                .put_string(WIFI_NAMESPACE, &ssid_key(i), &credential.ssid)?;
            self.store
                .put_string(WIFI_NAMESPACE, &pwd_key(i), &credential.password)?;
        }
        self.store
            .put_int(WIFI_NAMESPACE, "count", saved.len() as i64)?;
        for i in saved.len()..previous {
            self.store.remove(WIFI_NAMESPACE, &ssid_key(i))?;
            self.store.remove(WIFI_NAMESPACE, &pwd_key(i))?;
        }

        debug!(count = saved.len(), "Saved remembered networks");
        Ok(())
    }
}

fn ssid_key(index: usize) -> String {
    format!("ssid{}", index)
}

fn pwd_key(index: usize) -> String {
    format!("pwd{}", index)
}
