//! Environment variable helpers
//!
//! Fallbacks for settings that can come from the environment when no flag
//! or config file value is given.

use std::env;

/// Extension trait for reading environment variables with defaults.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// # Example
    /// ```ignore
    /// let path = String::env_or("PG_REPLICATION_LAG_CONFIG", "./pg-replication-lag.yaml");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get an environment variable as a boolean.
    ///
    /// Returns `true` if the value is "true" (case-insensitive), `false` for
    /// any other value, and `default` when the variable is not set.
    fn env_bool(name: &str, default: bool) -> bool {
        env::var(name)
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(default)
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}
