//! Owner closure cache
//!
//! Entries are keyed by a BLAKE3 hash of the principal's identity and
//! claims. An entry is only served while the identity state version it was
//! computed against is still current and its TTL has not elapsed.

use crate::config::CacheConfig;
use crate::principal::Principal;
use crate::types::Owner;
use blake3::Hasher;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache key type (BLAKE3 hash)
type CacheKey = [u8; 32];

/// Cached closure with its state version and TTL
#[derive(Clone)]
struct CachedEntry {
    owners: Arc<BTreeSet<Owner>>,
    state_version: u64,
    cached_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub invalidations: usize,
    pub size: usize,
}

pub struct OwnerCache {
    entries: DashMap<CacheKey, CachedEntry>,
    config: CacheConfig,
    stats: DashMap<&'static str, usize>,
}

impl OwnerCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: DashMap::new(),
        }
    }

    /// Cached closure for `principal`, if still valid at `state_version`
    pub fn get(&self, principal: &Principal, state_version: u64) -> Option<Arc<BTreeSet<Owner>>> {
        let key = Self::compute_key(principal);

        if let Some(entry) = self.entries.get(&key) {
            let stale = entry.state_version != state_version;
            let expired = entry.is_expired(self.config.ttl());
            if stale || expired {
                drop(entry);
                self.entries.remove(&key);
                self.increment_stat(if stale { "invalidations" } else { "expirations" });
                self.increment_stat("misses");
                return None;
            }

            self.increment_stat("hits");
            return Some(entry.owners.clone());
        }

        self.increment_stat("misses");
        None
    }

    pub fn put(&self, principal: &Principal, state_version: u64, owners: Arc<BTreeSet<Owner>>) {
        if self.entries.len() >= self.config.capacity {
            self.evict(state_version);
        }

        self.entries.insert(
            Self::compute_key(principal),
            CachedEntry {
                owners,
                state_version,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let stat = |name: &str| self.stats.get(name).map(|v| *v).unwrap_or(0);
        CacheStats {
            hits: stat("hits"),
            misses: stat("misses"),
            expirations: stat("expirations"),
            invalidations: stat("invalidations"),
            size: self.entries.len(),
        }
    }

    /// Drop stale and expired entries; if that frees nothing, drop all
    fn evict(&self, state_version: u64) {
        let ttl = self.config.ttl();
        self.entries
            .retain(|_, entry| entry.state_version == state_version && !entry.is_expired(ttl));
        if self.entries.len() >= self.config.capacity {
            self.entries.clear();
        }
    }

    fn compute_key(principal: &Principal) -> CacheKey {
        let mut hasher = Hasher::new();

        hasher.update(b"user:");
        hasher.update(principal.username.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|client:");
        hasher.update(principal.client_id.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|claims:");
        // serde_json maps are ordered, so the rendering is deterministic
        hasher.update(serde_json::Value::Object(principal.claims.clone()).to_string().as_bytes());
        hasher.update(b"|groups:");
        if let Some(groups) = &principal.group_claims {
            for group in groups {
                hasher.update(group.as_bytes());
                hasher.update(b",");
            }
        }

        *hasher.finalize().as_bytes()
    }

    fn increment_stat(&self, name: &'static str) {
        *self.stats.entry(name).or_insert(0) += 1;
    }
}
