//! Expiring LRU - A bounded key-value store with per-entry TTL
//!
//! Entries expire lazily at their own deadlines, and the least recently
//! used entry is evicted when a new key would exceed capacity.
//!
//! ```
//! use chrono::TimeDelta;
//! use expiring_lru::ExpiringLruStore;
//!
//! let mut store = ExpiringLruStore::new(2, TimeDelta::seconds(100)).unwrap();
//! store.set("a", 1);
//! store.set("b", 2);
//! store.set("c", 3);
//!
//! assert!(store.get(&"a").is_err());
//! assert_eq!(store.get(&"b"), Ok(&2));
//! assert_eq!(store.get(&"c"), Ok(&3));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod shared;

pub use cache::{
    CacheStats, Clock, Entry, ExpiringLruStore, Expiry, ManualClock, SystemClock,
};
pub use config::Config;
pub use error::{Result, StoreError};
pub use shared::SharedStore;
