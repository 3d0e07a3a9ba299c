//! YAML configuration for the lag check
//!
//! The file names both servers, the shared credentials, and how long the
//! replica may stay behind before the check gives up. Unknown keys are ignored
//! and missing keys keep their zero values.

use crate::error::{ConfigError, Side};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config path used when neither `-config` nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "./pg-replication-lag.yaml";

/// Sleep between two polls of the replica.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lag check configuration, loaded once at startup.
#[derive(Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub db_host_master: String,
    pub db_host_replica: String,
    #[serde(deserialize_with = "string_or_number")]
    pub db_port_master: String,
    #[serde(deserialize_with = "string_or_number")]
    pub db_port_replica: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    /// Bare numbers are seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub max_lag_before_exit: Duration,
    /// Bare numbers are milliseconds.
    #[serde(deserialize_with = "duration_millis")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "optional_duration_secs")]
    pub connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_host_master: String::new(),
            db_host_replica: String::new(),
            db_port_master: String::new(),
            db_port_replica: String::new(),
            db_user: String::new(),
            db_password: String::new(),
            db_name: String::new(),
            max_lag_before_exit: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_host_master", &self.db_host_master)
            .field("db_host_replica", &self.db_host_replica)
            .field("db_port_master", &self.db_port_master)
            .field("db_port_replica", &self.db_port_replica)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("max_lag_before_exit", &self.max_lag_before_exit)
            .field("poll_interval", &self.poll_interval)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Host and port of one side of the replication pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub side: Side,
    pub host: String,
    /// `None` leaves the driver's default port in place.
    pub port: Option<u16>,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is reported separately from an unreadable or
    /// malformed one so the caller can tell them apart.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but would break the polling loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Parse configuration from YAML text. Empty documents give the defaults.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Connection target for the given side.
    pub fn endpoint(&self, side: Side) -> Result<Endpoint, ConfigError> {
        let (host, port, key) = match side {
            Side::Primary => (&self.db_host_master, &self.db_port_master, "db_port_master"),
            Side::Replica => (&self.db_host_replica, &self.db_port_replica, "db_port_replica"),
        };

        Ok(Endpoint {
            side,
            host: host.clone(),
            port: parse_port(key, port)?,
        })
    }
}

fn parse_port(key: &'static str, raw: &str) -> Result<Option<u16>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u16>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key,
            reason: format!("{:?} is not a valid port ({})", raw, e),
        })
}

/// Parse a duration such as `30`, `2.5`, `250ms`, `1m 30s` or `2min`.
///
/// A bare number is scaled by `bare_unit`; anything else goes through
/// humantime.
pub fn parse_duration(input: &str, bare_unit: Duration) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }

    match s.parse::<f64>() {
        Ok(n) => Duration::try_from_secs_f64(n * bare_unit.as_secs_f64())
            .map_err(|e| format!("{:?}: {}", s, e)),
        Err(_) => humantime::parse_duration(s).map_err(|e| format!("{:?}: {}", s, e)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?
        .map(Scalar::into_text)
        .unwrap_or_default())
}

fn duration_with<'de, D: Deserializer<'de>>(
    d: D,
    bare_unit: Duration,
) -> Result<Option<Duration>, D::Error> {
    match Option::<Scalar>::deserialize(d)? {
        None => Ok(None),
        Some(raw) => parse_duration(&raw.into_text(), bare_unit)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn duration_secs<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    Ok(duration_with(d, Duration::from_secs(1))?.unwrap_or_default())
}

fn duration_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    Ok(duration_with(d, Duration::from_millis(1))?.unwrap_or(DEFAULT_POLL_INTERVAL))
}

fn optional_duration_secs<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    duration_with(d, Duration::from_secs(1))
}

/// Resolve the config path: explicit flag, then environment, then default.
pub fn resolve_path(flag: Option<PathBuf>) -> PathBuf {
    use common::ConfigExt;

    flag.unwrap_or_else(|| {
        PathBuf::from(String::env_or(
            "PG_REPLICATION_LAG_CONFIG",
            DEFAULT_CONFIG_PATH,
        ))
    })
}
