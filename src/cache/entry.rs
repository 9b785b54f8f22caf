//! Persisted cache entry format.
//!
//! Values are stored as JSON objects `{"svg": "...", "timestamp": <ms>}`.

use serde::{Deserialize, Serialize};

/// A rendered diagram together with the time it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "svg")]
    pub artifact: String,
    #[serde(rename = "timestamp")]
    pub created_at_ms: i64,
}

/// Outcome of decoding a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEntry {
    Valid(CacheEntry),
    Invalid,
}

impl CacheEntry {
    pub fn new(artifact: impl Into<String>, created_at_ms: i64) -> Self {
        Self {
            artifact: artifact.into(),
            created_at_ms,
        }
    }

    /// Strictly decode a stored value. Anything that is not a JSON object with a
    /// string `svg` and an integer `timestamp` collapses to [`DecodedEntry::Invalid`].
    pub fn decode(raw: &str) -> DecodedEntry {
        match serde_json::from_str::<CacheEntry>(raw) {
            Ok(entry) => DecodedEntry::Valid(entry),
            Err(_) => DecodedEntry::Invalid,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Age at `now_ms`; negative when the entry claims to come from the future.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    pub fn is_expired(&self, now_ms: i64, ttl_ms: u64) -> bool {
        let ttl = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
        self.age_ms(now_ms) > ttl
    }
}
