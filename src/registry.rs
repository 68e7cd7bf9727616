//! Key Cache & Registry Client (spec §4.3).
//!
//! A bounded, time-expiring in-memory cache in front of the external key
//! registry. Process-local; coherence across gateway instances is
//! intentionally eventual (spec §4.3). Styled on the reference node's
//! `RwLock`-guarded in-memory storage maps.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Deserialize;

/// A public key record as returned by the registry (spec §3, §6).
#[derive(Debug, Clone, Deserialize)]
pub struct KeyRecord {
    pub key_id: String,
    pub algorithm: String,
    pub is_active: String,
    pub public_key: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_domain: Option<String>,
}

impl KeyRecord {
    /// Only the literal string `"true"` counts as active (spec §3).
    pub fn is_active(&self) -> bool {
        self.is_active == "true"
    }
}

/// A cached value with its insertion time (spec §3 `CacheEntry`).
struct CacheEntry {
    value: KeyRecord,
    inserted_at: Instant,
}

/// Outcome of a registry lookup (spec §4.3).
pub enum RegistryOutcome {
    Found(KeyRecord),
    NotFound,
    FetchError,
}

/// In-memory, TTL-bounded cache of [`KeyRecord`]s in front of an HTTP registry.
pub struct KeyCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    client: reqwest::Client,
    registry_url: String,
}

impl KeyCache {
    pub fn new(registry_url: String, ttl: Duration, client: reqwest::Client) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            client,
            registry_url,
        }
    }

    /// Fetch a key record by `key_id`, consulting the cache first (spec §4.3 algorithm).
    pub async fn get(&self, key_id: &str) -> RegistryOutcome {
        if let Some(record) = self.cached_if_fresh(key_id) {
            return RegistryOutcome::Found(record);
        }

        self.evict(key_id);

        let url = format!("{}/keys/{}", self.registry_url, key_id);
        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(_) => return RegistryOutcome::FetchError,
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return RegistryOutcome::NotFound;
        }
        if !response.status().is_success() {
            return RegistryOutcome::NotFound;
        }

        match response.json::<KeyRecord>().await {
            Ok(record) => {
                self.insert(key_id, record.clone());
                RegistryOutcome::Found(record)
            }
            Err(_) => RegistryOutcome::FetchError,
        }
    }

    fn cached_if_fresh(&self, key_id: &str) -> Option<KeyRecord> {
        let entries = self.entries.read().expect("key cache lock poisoned");
        let entry = entries.get(key_id)?;
        if entry.inserted_at.elapsed() <= self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn evict(&self, key_id: &str) {
        let mut entries = self.entries.write().expect("key cache lock poisoned");
        if let Some(entry) = entries.get(key_id) {
            if entry.inserted_at.elapsed() > self.ttl {
                entries.remove(key_id);
            }
        }
    }

    fn insert(&self, key_id: &str, value: KeyRecord) {
        let mut entries = self.entries.write().expect("key cache lock poisoned");
        entries.insert(
            key_id.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}
