//! Command-line flags
//!
//! Accepts `-verbose` and `-config <path>` with one or two leading dashes,
//! as either `-flag value` or `-flag=value`.

use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::LagError;
use common::ConfigExt;
use std::path::PathBuf;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Args {
    pub verbose: bool,
    /// `None` when `-config` was not given.
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Args),
    Help,
}

/// Usage text printed for `-help` and for flag errors.
pub fn usage(program: &str) -> String {
    format!(
        "Usage of {program}:\n  \
         -config string\n    \tPath to YAML config file (default \"{DEFAULT_CONFIG_PATH}\")\n  \
         -verbose\n    \tAdd verbosity to the output\n\n\
         Environment:\n  \
         PG_REPLICATION_LAG_CONFIG   config path when -config is not given\n  \
         PG_REPLICATION_LAG_VERBOSE  \"true\" enables -verbose\n  \
         RUST_LOG                    log filter directives\n"
    )
}

fn parse_bool(flag: &str, value: &str) -> Result<bool, LagError> {
    match value.to_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(LagError::Usage(format!(
            "invalid boolean value {:?} for -{}",
            value, flag
        ))),
    }
}

/// Parse arguments (without the program name).
///
/// `-verbose` falls back to `PG_REPLICATION_LAG_VERBOSE` when absent.
pub fn parse_args<I>(args: I) -> Result<Command, LagError>
where
    I: IntoIterator<Item = String>,
{
    let mut verbose = None;
    let mut config = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--" {
            break;
        }

        let Some(flag) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
            return Err(LagError::Usage(format!("unexpected argument {:?}", arg)));
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (flag, None),
        };

        match name {
            "h" | "help" => return Ok(Command::Help),
            "verbose" => {
                verbose = Some(match inline {
                    Some(value) => parse_bool(name, &value)?,
                    None => true,
                });
            }
            "config" => {
                let value = match inline {
                    Some(value) => value,
                    None => args.next().ok_or_else(|| {
                        LagError::Usage("flag needs an argument: -config".to_string())
                    })?,
                };
                config = Some(PathBuf::from(value));
            }
            _ => {
                return Err(LagError::Usage(format!(
                    "flag provided but not defined: -{}",
                    name
                )))
            }
        }
    }

    if let Some(extra) = args.next() {
        return Err(LagError::Usage(format!("unexpected argument {:?}", extra)));
    }

    Ok(Command::Run(Args {
        verbose: verbose.unwrap_or_else(|| bool::env_bool("PG_REPLICATION_LAG_VERBOSE", false)),
        config,
    }))
}
