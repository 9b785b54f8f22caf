//! Cache policy: key namespace and entry lifetime.

use std::time::Duration;

use super::keys::DEFAULT_CACHE_PREFIX;

/// One hour.
pub const DEFAULT_TTL_MS: u64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Namespace prefix for every key this cache owns.
    pub prefix: String,
    /// Entries strictly older than this are treated as absent.
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            prefix: settings.prefix.clone(),
            ttl_ms: settings.ttl.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Whether `key` lives in this cache's namespace.
    pub fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.prefix)
    }
}
