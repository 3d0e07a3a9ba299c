//! Error taxonomy for a lag check
//!
//! Every stage returns a `LagError`; only the binary's top-level handler logs
//! it and turns it into a process exit status.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration file problems, all detected before any connection is made.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config file found at {0}, can not continue")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Which side of the replication pair an operation ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Primary,
    Replica,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Primary => f.write_str("primary"),
            Side::Replica => f.write_str("replica"),
        }
    }
}

/// Failures while talking to a server after the connection is up.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("database error on {side}: {source}")]
    Database {
        side: Side,
        #[source]
        source: postgres::Error,
    },

    #[error("{side} returned no WAL position (is the replica in recovery?)")]
    MissingPosition { side: Side },

    #[error("unparsable WAL distance {value:?} returned by {side}")]
    InvalidDistance { side: Side, value: String },

    #[error("unparsable server_version_num {value:?} returned by {side}")]
    InvalidServerVersion { side: Side, value: String },
}

#[derive(Error, Debug)]
pub enum LagError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: could not connect to {side} at {host}:{port}: {source}")]
    Connection {
        side: Side,
        host: String,
        port: u16,
        #[source]
        source: postgres::Error,
    },

    #[error("failed to set up TLS for {side}: {source}")]
    Tls {
        side: Side,
        #[source]
        source: openssl::error::ErrorStack,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(
        "BAILING, waited too long ({time}, {bytes} bytes behind)",
        time = crate::report::format_elapsed(*.elapsed)
    )]
    TimeoutExceeded { elapsed: Duration, bytes: i64 },
}

impl LagError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            LagError::TimeoutExceeded { .. } => 1,
            LagError::Usage(_) | LagError::Config(_) => 2,
            LagError::Connection { .. } | LagError::Tls { .. } => 3,
            LagError::Query(_) => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, LagError>;
