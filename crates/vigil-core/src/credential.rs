//! # Network Credentials
//!
//! Remembered wireless networks and the policy that governs the list.
//!
//! ## List Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     RememberedNetworks (capacity N)                     │
//! │                                                                         │
//! │  upsert(C)                                                              │
//! │  ├── C.ssid already present ─► overwrite in place         (Updated)    │
//! │  ├── len < N               ─► push C                      (Added)      │
//! │  └── len == N              ─► pop LAST, push C   (AddedWithEviction)   │
//! │                                                                         │
//! │  rank_by_signal(scan)                                                   │
//! │  ├── merge best observed RSSI per SSID into entries                    │
//! │  ├── sort descending by RSSI, stable                                   │
//! │  └── networks absent from the scan rank last (-100 dBm)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Eviction removes the most recently appended entry, not the oldest. A user
//! who keeps adding networks to a full list replaces the same slot.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validation::{validate_password, validate_ssid, ValidationResult};

/// Signal level assumed for remembered networks not seen in the last scan.
pub const UNSEEN_SIGNAL_DBM: i8 = -100;

// =============================================================================
// Network Credential
// =============================================================================

/// SSID and password for one network.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredential {
    pub ssid: String,
    pub password: String,
    /// RSSI from the most recent scan that saw this network.
    #[serde(default)]
    pub last_known_signal: Option<i8>,
    #[serde(default)]
    pub is_remembered: bool,
}

impl NetworkCredential {
    /// Builds a validated credential.
    ///
    /// Over-length values are rejected rather than truncated.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> ValidationResult<Self> {
        let ssid = ssid.into();
        let password = password.into();
        validate_ssid(&ssid)?;
        validate_password(&password)?;

        Ok(NetworkCredential {
            ssid,
            password,
            last_known_signal: None,
            is_remembered: false,
        })
    }

    /// Signal used for ranking.
    pub fn rank_signal(&self) -> i8 {
        self.last_known_signal.unwrap_or(UNSEEN_SIGNAL_DBM)
    }
}

// Passwords stay out of log output.
impl fmt::Debug for NetworkCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredential")
            .field("ssid", &self.ssid)
            .field("password", &"********")
            .field("last_known_signal", &self.last_known_signal)
            .field("is_remembered", &self.is_remembered)
            .finish()
    }
}

// =============================================================================
// Remembered Networks
// =============================================================================

/// Result of [`RememberedNetworks::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An entry with the same SSID was overwritten.
    Updated,
    /// The credential was appended.
    Added,
    /// The list was full; the carried SSID was evicted first.
    AddedWithEviction(String),
}

/// Bounded, ordered list of remembered networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberedNetworks {
    entries: Vec<NetworkCredential>,
    capacity: usize,
}

impl RememberedNetworks {
    pub fn new(capacity: usize) -> Self {
        RememberedNetworks {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds the list from persisted entries, keeping at most `capacity`.
    pub fn from_entries(entries: Vec<NetworkCredential>, capacity: usize) -> Self {
        let entries = entries
            .into_iter()
            .take(capacity)
            .map(|mut c| {
                c.is_remembered = true;
                c
            })
            .collect();
        RememberedNetworks { entries, capacity }
    }

    /// Inserts or updates a credential by SSID.
    pub fn upsert(&mut self, mut credential: NetworkCredential) -> UpsertOutcome {
        credential.is_remembered = true;

        if let Some(existing) = self.entries.iter_mut().find(|c| c.ssid == credential.ssid) {
            existing.password = credential.password;
            if credential.last_known_signal.is_some() {
                existing.last_known_signal = credential.last_known_signal;
            }
            return UpsertOutcome::Updated;
        }

        if self.capacity == 0 {
            return UpsertOutcome::AddedWithEviction(credential.ssid);
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop().map(|c| c.ssid)
        } else {
            None
        };
        self.entries.push(credential);

        match evicted {
            Some(ssid) => UpsertOutcome::AddedWithEviction(ssid),
            None => UpsertOutcome::Added,
        }
    }

    /// Removes the entry with `ssid`. Returns true if one was removed.
    pub fn forget(&mut self, ssid: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|c| c.ssid != ssid);
        self.entries.len() != before
    }

    pub fn get(&self, ssid: &str) -> Option<&NetworkCredential> {
        self.entries.iter().find(|c| c.ssid == ssid)
    }

    pub fn contains(&self, ssid: &str) -> bool {
        self.get(ssid).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkCredential> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[NetworkCredential] {
        &self.entries
    }

    /// Merges observed signal levels and returns candidates, strongest first.
    ///
    /// `observed` is a list of `(ssid, rssi)` pairs from a scan; duplicates
    /// keep their strongest reading. Entries absent from the scan have their
    /// signal cleared and rank last in their original order.
    pub fn rank_by_signal<'a, I>(&mut self, observed: I) -> Vec<NetworkCredential>
    where
        I: IntoIterator<Item = (&'a str, i8)>,
    {
        let mut best: HashMap<&str, i8> = HashMap::new();
        for (ssid, rssi) in observed {
            best.entry(ssid)
                .and_modify(|current| *current = (*current).max(rssi))
                .or_insert(rssi);
        }

        for entry in &mut self.entries {
            entry.last_known_signal = best.get(entry.ssid.as_str()).copied();
        }

        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.rank_signal().cmp(&a.rank_signal()));
        ranked
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(ssid: &str) -> NetworkCredential {
        NetworkCredential::new(ssid, "secret-pass").unwrap()
    }

    #[test]
    fn test_credential_rejects_invalid_input() {
        assert!(NetworkCredential::new("", "pw").is_err());
        assert!(NetworkCredential::new("Store", "").is_err());
        assert!(NetworkCredential::new("s".repeat(33), "pw").is_err());
        assert!(NetworkCredential::new("Store", "p".repeat(65)).is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let output = format!("{:?}", cred("Store"));
        assert!(output.contains("Store"));
        assert!(!output.contains("secret-pass"));
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let mut list = RememberedNetworks::new(5);
        list.upsert(cred("A"));
        list.upsert(cred("B"));

        let updated = NetworkCredential::new("A", "new-password").unwrap();
        assert_eq!(list.upsert(updated), UpsertOutcome::Updated);

        assert_eq!(list.len(), 2);
        assert_eq!(list.as_slice()[0].ssid, "A");
        assert_eq!(list.as_slice()[0].password, "new-password");
    }

    #[test]
    fn test_overflow_evicts_last_entry() {
        let mut list = RememberedNetworks::new(3);
        for ssid in ["A", "B", "C"] {
            assert_eq!(list.upsert(cred(ssid)), UpsertOutcome::Added);
        }

        assert_eq!(
            list.upsert(cred("D")),
            UpsertOutcome::AddedWithEviction("C".to_string())
        );
        assert_eq!(
            list.upsert(cred("E")),
            UpsertOutcome::AddedWithEviction("D".to_string())
        );

        let ssids: Vec<&str> = list.iter().map(|c| c.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["A", "B", "E"]);
    }

    #[test]
    fn test_forget() {
        let mut list = RememberedNetworks::new(5);
        list.upsert(cred("A"));
        assert!(list.forget("A"));
        assert!(!list.forget("A"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_from_entries_caps_at_capacity() {
        let entries = ["A", "B", "C", "D"].iter().map(|s| cred(s)).collect();
        let list = RememberedNetworks::from_entries(entries, 2);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|c| c.is_remembered));
    }

    #[test]
    fn test_rank_by_signal() {
        let mut list = RememberedNetworks::new(5);
        list.upsert(cred("Unseen"));
        list.upsert(cred("Weak"));
        list.upsert(cred("Strong"));

        let ranked = list.rank_by_signal([("Weak", -70), ("Strong", -40), ("Weak", -65), ("Other", -30)]);

        let order: Vec<&str> = ranked.iter().map(|c| c.ssid.as_str()).collect();
        assert_eq!(order, vec!["Strong", "Weak", "Unseen"]);
        assert_eq!(ranked[1].last_known_signal, Some(-65));
        assert_eq!(list.get("Unseen").unwrap().last_known_signal, None);
    }

    #[test]
    fn test_rank_is_stable_for_equal_signal() {
        let mut list = RememberedNetworks::new(5);
        list.upsert(cred("First"));
        list.upsert(cred("Second"));

        let ranked = list.rank_by_signal(std::iter::empty());
        assert_eq!(ranked[0].ssid, "First");
        assert_eq!(ranked[1].ssid, "Second");
    }
}
