//! Error types for the expiring LRU store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for store operations.
///
/// Every error is local to the call that produced it; a failed call never
/// leaves the store partially mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key is absent, or was present but its deadline has passed
    #[error("Key not found")]
    KeyNotFound,

    /// Construction or reconfiguration parameters were rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// == Result Type Alias ==
/// Convenience Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
