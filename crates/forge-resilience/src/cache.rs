//! Response cache for remote agent outputs.
//!
//! Entries expire lazily: an entry past its TTL is treated as absent on
//! `get` and dropped at that point. Inserts evict expired entries first and
//! then the oldest ones when the cache is full.

use dashmap::DashMap;
use forge_core::{AgentOutput, Fingerprint};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum entries kept; 0 means unbounded
    pub max_entries: usize,
    /// TTL used by [`ResponseCache::insert`]
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    output: AgentOutput,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped to make room or after expiring
    pub evictions: u64,
    /// Entries currently stored, including expired ones not yet dropped
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a fraction of lookups
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL-bounded map from task fingerprint to output
#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,
    entries: DashMap<Fingerprint, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    /// Create a new cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up an output. Never returns an entry whose TTL has elapsed.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<AgentOutput> {
        let now = Instant::now();

        let found = self.entries.get(fingerprint).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.output.clone())
            }
        });

        match found {
            Some(Some(output)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, "Cache hit");
                Some(output)
            }
            Some(None) => {
                // Re-check under the write lock; a fresh put may have landed.
                if self
                    .entries
                    .remove_if(fingerprint, |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = %fingerprint, "Cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an output for `ttl`. Overwrites any existing entry.
    pub fn put(&self, fingerprint: Fingerprint, output: AgentOutput, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        if !self.entries.contains_key(&fingerprint) {
            self.evict_if_needed();
        }

        self.entries.insert(
            fingerprint,
            CacheEntry {
                output,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Store an output with the default TTL
    pub fn insert(&self, fingerprint: Fingerprint, output: AgentOutput) {
        self.put(fingerprint, output, self.config.default_ttl);
    }

    /// Remove one entry
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Entries currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn evict_if_needed(&self) {
        let max = self.config.max_entries;
        if max == 0 || self.entries.len() < max {
            return;
        }

        self.purge_expired();

        let excess = (self.entries.len() + 1).saturating_sub(max);
        if excess == 0 {
            return;
        }

        let mut by_age: Vec<(Fingerprint, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        for (key, _) in by_age.into_iter().take(excess) {
            if self.entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(evicted = excess, max_entries = max, "Cache full, evicted oldest entries");
    }
}
