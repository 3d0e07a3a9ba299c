//! PostgreSQL streaming replication lag check
//!
//! Captures the primary's WAL position, waits for the replica to replay up to
//! it, and reports how long that took and how far behind the replica started.
//! Every failure surfaces as a [`LagError`] for the caller to turn into an
//! exit status.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod poller;
pub mod report;

pub use cli::{parse_args, usage, Args, Command};
pub use config::Config;
pub use error::{ConfigError, LagError, QueryError, Result, Side};
pub use gateway::Gateway;
pub use poller::{wait_for_catch_up, PollSettings, WalPosition, WalProbe};
pub use report::LagReport;

use tracing::debug;

/// Load the configuration, connect to both servers and poll until the
/// replica catches up.
///
/// The configuration is fully loaded before any connection is attempted.
pub fn run(args: &Args) -> Result<LagReport> {
    let path = config::resolve_path(args.config.clone());
    let config = Config::load(&path)?;
    debug!(path = %path.display(), ?config, "Loaded configuration");

    let mut gateway = Gateway::connect(&config)?;
    wait_for_catch_up(&mut gateway, &PollSettings::from_config(&config, args.verbose))
}
