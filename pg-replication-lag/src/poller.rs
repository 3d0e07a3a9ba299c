//! Replication lag polling loop
//!
//! The primary's WAL position is read once and frozen as the reference. The
//! replica is then polled until its replay position reaches that reference,
//! or until the configured maximum lag has passed.

use crate::config::{Config, DEFAULT_POLL_INTERVAL};
use crate::error::{LagError, Result};
use crate::report::{format_elapsed, LagReport};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// A server-reported WAL position such as `0/3000060`.
///
/// Positions are opaque here; only the server compares them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalPosition(String);

impl WalPosition {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of WAL positions and distances for one replication pair.
pub trait WalProbe {
    /// Current write position of the primary.
    fn primary_position(&mut self) -> Result<WalPosition>;

    /// Last position replayed by the replica.
    fn replica_position(&mut self) -> Result<WalPosition>;

    /// Bytes between `reference` and `replica`. Zero or negative once the
    /// replica has replayed up to the reference.
    fn distance(&mut self, reference: &WalPosition, replica: &WalPosition) -> Result<i64>;
}

/// Timing knobs for the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub max_lag: Duration,
    pub interval: Duration,
    pub verbose: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_lag: Duration::ZERO,
            interval: DEFAULT_POLL_INTERVAL,
            verbose: false,
        }
    }
}

impl PollSettings {
    pub fn from_config(config: &Config, verbose: bool) -> Self {
        Self {
            max_lag: config.max_lag_before_exit,
            interval: config.poll_interval,
            verbose,
        }
    }
}

/// Wait for the replica to catch up with the primary's current position.
///
/// Returns the elapsed time and the distance seen on the first poll, or
/// `TimeoutExceeded` once the replica is still behind after `max_lag`.
pub fn wait_for_catch_up<P: WalProbe>(probe: &mut P, settings: &PollSettings) -> Result<LagReport> {
    let reference = probe.primary_position()?;
    let start = Instant::now();
    let mut initial_bytes_behind = None;

    loop {
        let replica = probe.replica_position()?;
        let bytes = probe.distance(&reference, &replica)?;
        let initial = *initial_bytes_behind.get_or_insert(bytes);

        if settings.verbose {
            info!(
                %reference,
                %replica,
                "Running {} behind, missing {} bytes",
                format_elapsed(start.elapsed()),
                bytes
            );
        }

        if bytes <= 0 {
            return Ok(LagReport::new(start.elapsed(), initial));
        }

        let elapsed = start.elapsed();
        if elapsed > settings.max_lag {
            return Err(LagError::TimeoutExceeded { elapsed, bytes });
        }

        thread::sleep(settings.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, Side};
    use std::collections::VecDeque;

    /// Replays a fixed list of distances; the last one repeats forever.
    struct ScriptedProbe {
        distances: VecDeque<i64>,
        primary_reads: usize,
        replica_reads: usize,
        references: Vec<WalPosition>,
    }

    impl ScriptedProbe {
        fn new(distances: &[i64]) -> Self {
            Self {
                distances: distances.iter().copied().collect(),
                primary_reads: 0,
                replica_reads: 0,
                references: Vec::new(),
            }
        }
    }

    impl WalProbe for ScriptedProbe {
        fn primary_position(&mut self) -> Result<WalPosition> {
            self.primary_reads += 1;
            Ok(WalPosition::new(format!("0/{:X}", 0x3000000 + self.primary_reads)))
        }

        fn replica_position(&mut self) -> Result<WalPosition> {
            self.replica_reads += 1;
            Ok(WalPosition::new(format!("0/{:X}", self.replica_reads)))
        }

        fn distance(&mut self, reference: &WalPosition, _replica: &WalPosition) -> Result<i64> {
            self.references.push(reference.clone());
            let next = if self.distances.len() > 1 {
                self.distances.pop_front()
            } else {
                self.distances.front().copied()
            };
            Ok(next.unwrap_or(0))
        }
    }

    fn fast(max_lag: Duration) -> PollSettings {
        PollSettings {
            max_lag,
            interval: Duration::from_millis(1),
            verbose: true,
        }
    }

    #[test]
    fn test_converging_replica_reports_first_distance() {
        let mut probe = ScriptedProbe::new(&[4096, 2048, 0]);
        let settings = PollSettings {
            max_lag: Duration::from_secs(60),
            ..PollSettings::default()
        };

        let report = wait_for_catch_up(&mut probe, &settings).unwrap();

        assert_eq!(report.initial_bytes_behind, 4096);
        assert_eq!(probe.replica_reads, 3);
        // Two 100ms sleeps between three polls.
        assert!(report.elapsed >= Duration::from_millis(200));
        assert!(report.to_line().contains(r#""bytes": "4096""#));
    }

    #[test]
    fn test_zero_distance_succeeds_immediately() {
        let mut probe = ScriptedProbe::new(&[0, 4096]);
        let settings = PollSettings {
            max_lag: Duration::from_secs(60),
            interval: Duration::from_secs(30),
            verbose: false,
        };

        let report = wait_for_catch_up(&mut probe, &settings).unwrap();

        assert_eq!(report.initial_bytes_behind, 0);
        assert_eq!(probe.replica_reads, 1);
        assert!(report.elapsed < Duration::from_secs(30));
    }

    #[test]
    fn test_replica_past_reference_counts_as_caught_up() {
        let mut probe = ScriptedProbe::new(&[512, -64]);
        let report = wait_for_catch_up(&mut probe, &fast(Duration::from_secs(60))).unwrap();
        assert_eq!(report.initial_bytes_behind, 512);
        assert_eq!(probe.replica_reads, 2);
    }

    #[test]
    fn test_reference_captured_once() {
        let mut probe = ScriptedProbe::new(&[300, 200, 100, 0]);
        wait_for_catch_up(&mut probe, &fast(Duration::from_secs(60))).unwrap();

        assert_eq!(probe.primary_reads, 1);
        assert_eq!(probe.references.len(), 4);
        assert!(probe.references.iter().all(|r| r == &probe.references[0]));
    }

    #[test]
    fn test_initial_snapshot_survives_growing_lag() {
        let mut probe = ScriptedProbe::new(&[100, 5000, 9000, 0]);
        let report = wait_for_catch_up(&mut probe, &fast(Duration::from_secs(60))).unwrap();
        assert_eq!(report.initial_bytes_behind, 100);
    }

    #[test]
    fn test_stuck_replica_times_out() {
        let mut probe = ScriptedProbe::new(&[8192]);
        let max_lag = Duration::from_millis(20);

        let err = wait_for_catch_up(&mut probe, &fast(max_lag)).unwrap_err();

        match err {
            LagError::TimeoutExceeded { elapsed, bytes } => {
                assert!(elapsed > max_lag);
                assert_eq!(bytes, 8192);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(probe.replica_reads > 1);
    }

    struct FailingProbe;

    impl WalProbe for FailingProbe {
        fn primary_position(&mut self) -> Result<WalPosition> {
            Ok(WalPosition::new("0/3000060"))
        }

        fn replica_position(&mut self) -> Result<WalPosition> {
            Err(QueryError::MissingPosition { side: Side::Replica }.into())
        }

        fn distance(&mut self, _: &WalPosition, _: &WalPosition) -> Result<i64> {
            unreachable!("distance queried without a replica position")
        }
    }

    #[test]
    fn test_query_error_stops_polling() {
        let err = wait_for_catch_up(&mut FailingProbe, &fast(Duration::from_secs(60))).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            max_lag_before_exit: Duration::from_secs(45),
            poll_interval: Duration::from_millis(250),
            ..Config::default()
        };
        let settings = PollSettings::from_config(&config, true);
        assert_eq!(settings.max_lag, Duration::from_secs(45));
        assert_eq!(settings.interval, Duration::from_millis(250));
        assert!(settings.verbose);
    }
}
