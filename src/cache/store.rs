//! Diagram render cache.
//!
//! A passive, best-effort key/value cache from diagram source text to rendered
//! SVG. None of the public operations fail: storage that is missing, corrupt or
//! full degrades to a cache miss on reads and to nothing happening on writes.

use std::time::Instant;

use metrics::counter;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::entry::{CacheEntry, DecodedEntry};
use super::keys::cache_key;
use super::storage::SessionStorage;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_HIT_TOTAL: &str = "mermaid_cache_hit_total";
pub(crate) const METRIC_MISS_TOTAL: &str = "mermaid_cache_miss_total";
pub(crate) const METRIC_EXPIRED_TOTAL: &str = "mermaid_cache_expired_total";
pub(crate) const METRIC_CORRUPT_TOTAL: &str = "mermaid_cache_corrupt_total";
pub(crate) const METRIC_WRITE_TOTAL: &str = "mermaid_cache_write_total";
pub(crate) const METRIC_WRITE_FAILED_TOTAL: &str = "mermaid_cache_write_failed_total";
pub(crate) const METRIC_PURGED_TOTAL: &str = "mermaid_cache_purged_total";
pub(crate) const METRIC_CLEARED_TOTAL: &str = "mermaid_cache_cleared_total";

/// Expiring cache of rendered diagrams over injected session storage.
///
/// Constructed without storage (see [`DiagramCache::detached`]) the cache is a
/// no-op, which is the behaviour wanted during server-side rendering.
pub struct DiagramCache<S, C = SystemClock> {
    storage: Option<S>,
    clock: C,
    config: CacheConfig,
}

impl<S: SessionStorage> DiagramCache<S, SystemClock> {
    pub fn new(storage: S, config: CacheConfig) -> Self {
        Self::with_clock(Some(storage), SystemClock, config)
    }

    /// A cache with no backing storage. Every operation is a no-op.
    pub fn detached(config: CacheConfig) -> Self {
        Self::with_clock(None, SystemClock, config)
    }
}

impl<S: SessionStorage, C: Clock> DiagramCache<S, C> {
    pub fn with_clock(storage: Option<S>, clock: C, config: CacheConfig) -> Self {
        Self {
            storage,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn storage(&self) -> Option<&S> {
        self.storage.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.storage.is_some()
    }

    /// Storage key used for `diagram`.
    pub fn key_for(&self, diagram: &str) -> String {
        cache_key(&self.config.prefix, diagram)
    }

    /// Look up the rendered artifact for `diagram`.
    ///
    /// Never fails. Expired entries are deleted as a side effect; undecodable
    /// entries are reported as absent and left in place.
    pub fn get(&self, diagram: &str) -> Option<String> {
        let storage = self.storage.as_ref()?;
        let started_at = Instant::now();
        let key = self.key_for(diagram);

        let Some(raw) = storage.get_item(&key) else {
            counter!(METRIC_MISS_TOTAL).increment(1);
            debug!(
                target = SOURCE,
                op = "cache::get",
                result = "miss",
                key = %key,
                "Diagram not cached"
            );
            return None;
        };

        let entry = match CacheEntry::decode(&raw) {
            DecodedEntry::Valid(entry) => entry,
            DecodedEntry::Invalid => {
                counter!(METRIC_CORRUPT_TOTAL).increment(1);
                counter!(METRIC_MISS_TOTAL).increment(1);
                warn!(
                    target = SOURCE,
                    op = "cache::get",
                    result = "corrupt",
                    key = %key,
                    raw_bytes = raw.len(),
                    "Ignoring undecodable diagram cache entry"
                );
                return None;
            }
        };

        let now_ms = self.clock.now_ms();
        if entry.is_expired(now_ms, self.config.ttl_ms) {
            storage.remove_item(&key);
            counter!(METRIC_EXPIRED_TOTAL).increment(1);
            counter!(METRIC_MISS_TOTAL).increment(1);
            debug!(
                target = SOURCE,
                op = "cache::get",
                result = "expired",
                key = %key,
                age_ms = entry.age_ms(now_ms),
                ttl_ms = self.config.ttl_ms,
                "Dropped expired diagram cache entry"
            );
            return None;
        }

        counter!(METRIC_HIT_TOTAL).increment(1);
        info!(
            target = SOURCE,
            op = "cache::get",
            result = "hit",
            key = %key,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            svg_bytes = entry.artifact.len(),
            "Diagram served from cache"
        );
        Some(entry.artifact)
    }

    /// Store `artifact` for `diagram`, replacing any previous entry.
    ///
    /// Never fails. When the write is refused the cache purges expired
    /// entries in its namespace and drops the write without retrying.
    pub fn set(&self, diagram: &str, artifact: &str) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        let key = self.key_for(diagram);
        let entry = CacheEntry::new(artifact, self.clock.now_ms());

        let value = match entry.encode() {
            Ok(value) => value,
            Err(err) => {
                counter!(METRIC_WRITE_FAILED_TOTAL).increment(1);
                warn!(
                    target = SOURCE,
                    op = "cache::set",
                    result = "encode_error",
                    key = %key,
                    error = %err,
                    "Failed to encode diagram cache entry"
                );
                return;
            }
        };

        match storage.set_item(&key, &value) {
            Ok(()) => {
                counter!(METRIC_WRITE_TOTAL).increment(1);
                info!(
                    target = SOURCE,
                    op = "cache::set",
                    result = "stored",
                    key = %key,
                    svg_bytes = artifact.len(),
                    "Cached rendered diagram"
                );
            }
            Err(err) => {
                counter!(METRIC_WRITE_FAILED_TOTAL).increment(1);
                warn!(
                    target = SOURCE,
                    op = "cache::set",
                    result = "write_error",
                    key = %key,
                    quota = err.is_quota(),
                    error = %err,
                    "Failed to cache diagram; purging expired entries"
                );
                self.purge_expired();
            }
        }
    }

    /// Remove every key in this cache's namespace. Keys owned by anyone else
    /// are left untouched.
    pub fn clear_all(&self) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };

        let owned: Vec<String> = storage
            .keys()
            .into_iter()
            .filter(|key| self.config.owns(key))
            .collect();
        for key in &owned {
            storage.remove_item(key);
        }

        counter!(METRIC_CLEARED_TOTAL).increment(owned.len() as u64);
        info!(
            target = SOURCE,
            op = "cache::clear_all",
            removed = owned.len(),
            "Cleared diagram cache entries"
        );
    }

    /// Remove expired and undecodable entries in this cache's namespace,
    /// returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Some(storage) = self.storage.as_ref() else {
            return 0;
        };
        let now_ms = self.clock.now_ms();

        let stale: Vec<String> = storage
            .keys()
            .into_iter()
            .filter(|key| self.config.owns(key))
            .filter(|key| match storage.get_item(key) {
                Some(raw) => match CacheEntry::decode(&raw) {
                    DecodedEntry::Valid(entry) => entry.is_expired(now_ms, self.config.ttl_ms),
                    DecodedEntry::Invalid => true,
                },
                None => false,
            })
            .collect();
        for key in &stale {
            storage.remove_item(key);
        }

        counter!(METRIC_PURGED_TOTAL).increment(stale.len() as u64);
        debug!(
            target = SOURCE,
            op = "cache::purge_expired",
            removed = stale.len(),
            "Purged stale diagram cache entries"
        );
        stale.len()
    }
}
