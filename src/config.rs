//! Configuration Module
//!
//! Handles loading store configuration from environment variables.

use std::env;

/// Store configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of live entries, None = unlimited
    pub max_entries: Option<usize>,
    /// Default TTL in seconds for entries inserted without an explicit TTL
    pub default_ttl: u64,
}

const DEFAULT_MAX_ENTRIES: usize = 1000;
const DEFAULT_TTL_SECS: u64 = 300;

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum live entries, or `unlimited`/`none` (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    ///
    /// Unparsable values fall back to the defaults. `MAX_ENTRIES=0` is kept
    /// as-is and rejected when a store is built from it.
    pub fn from_env() -> Self {
        Self {
            max_entries: env::var("MAX_ENTRIES")
                .ok()
                .map(|v| parse_max_entries(&v))
                .unwrap_or(Some(DEFAULT_MAX_ENTRIES)),
            default_ttl: env::var("DEFAULT_TTL")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_TTL_SECS),
        }
    }
}

fn parse_max_entries(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unlimited") || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(raw.parse().unwrap_or(DEFAULT_MAX_ENTRIES))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            default_ttl: DEFAULT_TTL_SECS,
        }
    }
}
