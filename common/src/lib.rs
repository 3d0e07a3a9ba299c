//! Shared utilities for pg-replication-lag
//!
//! - Logging initialization
//! - Environment variable helpers

pub mod config;
pub mod logging;

pub use config::ConfigExt;
pub use logging::init_logging;
