//! Success report printed on stdout

use std::fmt;
use std::time::Duration;

/// Outcome of a check where the replica caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagReport {
    /// Time from the reference capture until the replica caught up.
    pub elapsed: Duration,
    /// Distance seen on the first poll, not the last one.
    pub initial_bytes_behind: i64,
}

impl LagReport {
    pub fn new(elapsed: Duration, initial_bytes_behind: i64) -> Self {
        Self {
            elapsed,
            initial_bytes_behind,
        }
    }

    /// Single-line JSON document; both nested values are strings.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LagReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = serde_json::to_string(&format_elapsed(self.elapsed)).map_err(|_| fmt::Error)?;
        let bytes = serde_json::to_string(&self.initial_bytes_behind.to_string())
            .map_err(|_| fmt::Error)?;
        write!(
            f,
            "{{ \"postgresql-replication-lag\": {{ \"time\": {}, \"bytes\": {} }} }}",
            time, bytes
        )
    }
}

/// `value / unit` with the remainder as trailing-zero-free decimals.
fn decimal(value: u128, unit: u128, width: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Render a duration as `350ms`, `2.5s`, `1m35.5s` or `1h0m3s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let nanos = elapsed.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000, 6));
    }

    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs_nanos = u128::from(total_secs % 60) * 1_000_000_000 + u128::from(elapsed.subsec_nanos());
    let secs = decimal(secs_nanos, 1_000_000_000, 9);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_line_shape() {
        let report = LagReport::new(Duration::from_millis(212), 4096);
        let line = report.to_line();

        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        let body = &parsed["postgresql-replication-lag"];
        assert_eq!(body["time"], "212ms");
        assert_eq!(body["bytes"], "4096");
        assert_eq!(parsed.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_display_matches_line() {
        let report = LagReport::new(Duration::from_millis(95_500), 4096);
        assert_eq!(report.to_string(), report.to_line());
        assert_eq!(
            report.to_string(),
            r#"{ "postgresql-replication-lag": { "time": "1m35.5s", "bytes": "4096" } }"#
        );
        assert_eq!(
            LagReport::new(Duration::from_secs(2), 0).to_string(),
            r#"{ "postgresql-replication-lag": { "time": "2s", "bytes": "0" } }"#
        );
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
        assert_eq!(format_elapsed(Duration::from_nanos(750)), "750ns");
        assert_eq!(format_elapsed(Duration::from_nanos(1_500)), "1.5µs");
        assert_eq!(format_elapsed(Duration::from_micros(212_400)), "212.4ms");
        assert_eq!(format_elapsed(Duration::from_millis(1_500)), "1.5s");
        assert_eq!(format_elapsed(Duration::from_secs(60)), "1m0s");
        assert_eq!(format_elapsed(Duration::from_millis(95_500)), "1m35.5s");
        assert_eq!(format_elapsed(Duration::from_secs(3603)), "1h0m3s");
    }
}
