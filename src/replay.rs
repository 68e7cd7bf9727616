//! Replay Guard (spec §4.4).
//!
//! Single-use tracking of nonces with a time-bounded retention window and
//! periodic eviction. The sweep loop follows the same shape as the
//! reference node's background sync loop: `loop { sweep(); sleep(interval) }`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a replay check (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Fresh,
    Replay,
}

/// Single-use nonce table. The sole purpose of the table is membership; no
/// value is ever read back (spec §4.4).
pub struct ReplayGuard {
    nonces: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ReplayGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Atomic test-and-insert: if `nonce` is already recorded, return
    /// `Replay`; otherwise record it and return `Fresh`.
    pub fn check_and_record(&self, nonce: &str) -> ReplayOutcome {
        let mut nonces = self.nonces.lock().expect("replay guard lock poisoned");
        if nonces.contains_key(nonce) {
            return ReplayOutcome::Replay;
        }
        nonces.insert(nonce.to_string(), Instant::now());
        ReplayOutcome::Fresh
    }

    /// Remove every entry whose `first_seen_at` is older than `NONCE_TTL`.
    /// Returns the number of entries evicted, for the sweep log line.
    pub fn sweep(&self) -> usize {
        let mut nonces = self.nonces.lock().expect("replay guard lock poisoned");
        let before = nonces.len();
        nonces.retain(|_, first_seen_at| first_seen_at.elapsed() <= self.ttl);
        before - nonces.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nonces.lock().expect("replay guard lock poisoned").len()
    }
}

/// Run the sweep loop forever, evicting stale entries every `interval`.
/// Spawned once at startup, modeled on the reference node's `FederationSync::run`.
pub async fn run_sweep_loop(guard: std::sync::Arc<ReplayGuard>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let evicted = guard.sweep();
        if evicted > 0 {
            tracing::info!(evicted, "replay guard sweep evicted stale nonces");
        }
    }
}
