//! pg-replication-lag - report how long a replica takes to catch up
//!
//! Prints one JSON line on stdout when the replica has replayed the primary's
//! current WAL position. Any failure is logged on stderr and ends the process
//! with a non-zero status.

use common::init_logging;
use pg_replication_lag::{parse_args, run, usage, Command};
use std::env;
use tracing::{error, info_span};

fn main() {
    let program = env::args()
        .next()
        .unwrap_or_else(|| "pg-replication-lag".to_string());

    let args = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            eprint!("{}", usage(&program));
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("{}", e);
            eprint!("{}", usage(&program));
            std::process::exit(e.exit_code());
        }
    };

    let _guard = init_logging(args.verbose);
    let _span = info_span!("pg-replication-lag").entered();

    match run(&args) {
        Ok(report) => println!("{}", report),
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}
