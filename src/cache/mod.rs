//! Cache Module
//!
//! Provides the in-memory store with lazy TTL expiration and LRU eviction.

mod clock;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{Entry, Expiry};
pub use lru::RecencyList;
pub use stats::CacheStats;
pub use store::{EvictionListener, ExpiringLruStore};
