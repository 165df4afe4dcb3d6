//! Process-local response cache with per-entry TTLs and glob
//! invalidation.
//!
//! Sync and the stock monitor invalidate product and category keys after
//! writes so stale reads never outlive a change; the warmup job
//! pre-populates entries for popular products.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use globset::Glob;
use tokio::sync::Mutex;

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Shared in-memory key/value cache.
#[derive(Default)]
pub struct CacheLayer {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Returns the cached value, dropping it if the TTL has lapsed.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let lapsed = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if lapsed {
            entries.remove(key);
        }
        None
    }

    /// Removes every key matching `pattern` (glob syntax). Returns the
    /// number of entries dropped; an unparseable pattern drops nothing.
    pub async fn clear_pattern(&self, pattern: &str) -> usize {
        let matcher = match Glob::new(pattern) {
            Ok(glob) => glob.compile_matcher(),
            Err(err) => {
                tracing::warn!(pattern, error = %err, "invalid cache invalidation pattern");
                return 0;
            }
        };

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !matcher.is_match(key));
        before - entries.len()
    }

    /// Drops entries past their TTL. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
