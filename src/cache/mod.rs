//! Diagram render cache.
//!
//! Maps Mermaid diagram source text to previously rendered SVG markup held in
//! session-scoped key/value storage:
//!
//! - **Keys** are `prefix + base36(hash(diagram))`, see [`hash_diagram`].
//! - **Values** are JSON `{"svg": "...", "timestamp": <ms since epoch>}`.
//! - **Expiry** is checked on read; stale entries are deleted when seen.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_ms = 3600000
//! prefix = "mermaid-cache-"
//! ```

mod clock;
mod config;
mod entry;
mod keys;
mod storage;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_TTL_MS};
pub use entry::{CacheEntry, DecodedEntry};
pub use keys::{DEFAULT_CACHE_PREFIX, cache_key, hash_diagram};
pub use storage::{SessionStorage, StorageError};
pub use store::DiagramCache;

pub(crate) use store::{
    METRIC_CLEARED_TOTAL, METRIC_CORRUPT_TOTAL, METRIC_EXPIRED_TOTAL, METRIC_HIT_TOTAL,
    METRIC_MISS_TOTAL, METRIC_PURGED_TOTAL, METRIC_WRITE_FAILED_TOTAL, METRIC_WRITE_TOTAL,
};
