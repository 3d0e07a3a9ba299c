//! Database gateway
//!
//! Holds one TLS connection to the primary and one to the replica and runs
//! the scalar WAL queries against them. Nothing here retries: the first
//! failure is returned to the caller.

use crate::config::{Config, Endpoint};
use crate::error::{LagError, QueryError, Result, Side};
use crate::poller::{WalPosition, WalProbe};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres::config::SslMode;
use postgres::types::ToSql;
use postgres::Client;
use postgres_openssl::MakeTlsConnector;
use tracing::debug;

const APPLICATION_NAME: &str = "pg-replication-lag";

/// First `server_version_num` with the `wal`/`lsn` function names.
const WAL_RENAME_VERSION: u32 = 100_000;

/// The three WAL statements, spelled for one server generation.
///
/// Positions are returned as text and passed back as bound text parameters
/// cast server-side, so the tokens never become part of the SQL.
#[derive(Debug, PartialEq, Eq)]
pub struct WalQueries {
    pub current_position: &'static str,
    pub replay_position: &'static str,
    pub distance: &'static str,
}

/// PostgreSQL 10 and later.
pub const WAL_QUERIES: WalQueries = WalQueries {
    current_position: "SELECT pg_current_wal_lsn()::text",
    replay_position: "SELECT pg_last_wal_replay_lsn()::text",
    distance: "SELECT pg_wal_lsn_diff($1::text::pg_lsn, $2::text::pg_lsn)::text",
};

/// PostgreSQL 9.4 to 9.6.
pub const XLOG_QUERIES: WalQueries = WalQueries {
    current_position: "SELECT pg_current_xlog_location()::text",
    replay_position: "SELECT pg_last_xlog_replay_location()::text",
    distance: "SELECT pg_xlog_location_diff($1::text::pg_lsn, $2::text::pg_lsn)::text",
};

impl WalQueries {
    pub fn for_server_version(version_num: u32) -> &'static WalQueries {
        if version_num >= WAL_RENAME_VERSION {
            &WAL_QUERIES
        } else {
            &XLOG_QUERIES
        }
    }
}

/// Run a query and return the first column of its last row as a string.
///
/// No rows and SQL NULL both yield an empty string.
pub fn query_scalar(
    client: &mut Client,
    side: Side,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> std::result::Result<String, QueryError> {
    let rows = client
        .query(sql, params)
        .map_err(|source| QueryError::Database { side, source })?;

    let values = rows
        .iter()
        .map(|row| row.try_get::<_, Option<String>>(0))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| QueryError::Database { side, source })?;
    Ok(last_value(values))
}

/// Last row wins; no rows or a NULL last row gives an empty string.
fn last_value<I>(values: I) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    values.into_iter().last().flatten().unwrap_or_default()
}

/// Parse the text form of a WAL distance.
pub fn parse_distance(side: Side, value: &str) -> std::result::Result<i64, QueryError> {
    let trimmed = value.trim();
    // pg_wal_lsn_diff returns numeric; whole byte counts may still carry a
    // zero fraction on some versions.
    let integral = trimmed
        .split_once('.')
        .filter(|(_, frac)| frac.chars().all(|c| c == '0'))
        .map(|(int, _)| int)
        .unwrap_or(trimmed);

    integral.parse().map_err(|_| QueryError::InvalidDistance {
        side,
        value: value.to_string(),
    })
}

struct Connection {
    side: Side,
    client: Client,
    queries: &'static WalQueries,
}

impl Connection {
    fn open(config: &Config, endpoint: &Endpoint) -> Result<Self> {
        let side = endpoint.side;
        let mut pg = postgres::Config::new();
        if !endpoint.host.is_empty() {
            pg.host(&endpoint.host);
        }
        if let Some(port) = endpoint.port {
            pg.port(port);
        }
        if !config.db_user.is_empty() {
            pg.user(&config.db_user);
        }
        if !config.db_password.is_empty() {
            pg.password(&config.db_password);
        }
        if !config.db_name.is_empty() {
            pg.dbname(&config.db_name);
        }
        if let Some(timeout) = config.connect_timeout {
            pg.connect_timeout(timeout);
        }
        pg.ssl_mode(SslMode::Require)
            .application_name(APPLICATION_NAME);

        // sslmode=require: encrypt, but do not verify the server certificate.
        let mut tls = SslConnector::builder(SslMethod::tls())
            .map_err(|source| LagError::Tls { side, source })?;
        tls.set_verify(SslVerifyMode::NONE);
        let connector = MakeTlsConnector::new(tls.build());

        debug!(%side, host = %endpoint.host, port = ?endpoint.port, "Connecting");
        let mut client = pg.connect(connector).map_err(|source| LagError::Connection {
            side,
            host: endpoint.host.clone(),
            port: endpoint.port.unwrap_or(5432),
            source,
        })?;

        let version = query_scalar(&mut client, side, "SHOW server_version_num", &[])?;
        let version_num: u32 =
            version
                .trim()
                .parse()
                .map_err(|_| QueryError::InvalidServerVersion {
                    side,
                    value: version.clone(),
                })?;
        debug!(%side, server_version = version_num, "Connected");

        Ok(Self {
            side,
            client,
            queries: WalQueries::for_server_version(version_num),
        })
    }

    fn position(&mut self, sql: &str) -> Result<WalPosition> {
        let token = query_scalar(&mut self.client, self.side, sql, &[])?;
        if token.is_empty() {
            return Err(QueryError::MissingPosition { side: self.side }.into());
        }
        Ok(WalPosition::new(token))
    }
}

/// Open connections to both servers of a replication pair.
pub struct Gateway {
    primary: Connection,
    replica: Connection,
}

impl Gateway {
    /// Connect to the primary, then the replica. Either failure is final.
    pub fn connect(config: &Config) -> Result<Self> {
        let primary = Connection::open(config, &config.endpoint(Side::Primary)?)?;
        let replica = Connection::open(config, &config.endpoint(Side::Replica)?)?;
        Ok(Self { primary, replica })
    }
}

impl WalProbe for Gateway {
    fn primary_position(&mut self) -> Result<WalPosition> {
        let sql = self.primary.queries.current_position;
        self.primary.position(sql)
    }

    fn replica_position(&mut self) -> Result<WalPosition> {
        let sql = self.replica.queries.replay_position;
        self.replica.position(sql)
    }

    fn distance(&mut self, reference: &WalPosition, replica: &WalPosition) -> Result<i64> {
        let side = self.replica.side;
        let sql = self.replica.queries.distance;
        let value = query_scalar(
            &mut self.replica.client,
            side,
            sql,
            &[&reference.as_str(), &replica.as_str()],
        )?;
        Ok(parse_distance(side, &value)?)
    }
}
