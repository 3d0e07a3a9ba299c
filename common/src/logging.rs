//! Structured logging initialization
//!
//! Logs go to stderr so stdout carries nothing but the report line.

use chrono::Local;
use std::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Guard that keeps the tracing subscriber active.
/// Drop this at the end of main to flush logs.
pub struct LogGuard;

/// Local wall-clock timestamps, `2024/01/31 13:45:07`.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y/%m/%d %H:%M:%S"))
    }
}

/// Initialize logging on stderr.
///
/// `verbose` lowers the default level to DEBUG; `RUST_LOG` directives still
/// apply on top.
///
/// # Example
/// ```ignore
/// let _guard = init_logging(false);
/// info!("Starting up...");
/// ```
pub fn init_logging(verbose: bool) -> LogGuard {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let format = tfmt::layer()
        .with_target(false)
        .with_timer(LocalTime)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();

    LogGuard
}
