//! Diagnostic logging.
//!
//! Stdout carries the mount specification and nothing else, so all events
//! go to stderr, which the automounter forwards to the system log.

use std::io::{self, IsTerminal};

use clap::ValueEnum;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dmount_common::{DmountError, DmountResult};

/// Environment variable holding extra filter directives.
pub const LOG_ENV: &str = "DMOUNT_LOG";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Default filter directive.
#[must_use]
pub const fn default_directive(debug: bool) -> &'static str {
    if debug { "dmount=debug" } else { "dmount=info" }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`DmountError::Config`] if `DMOUNT_LOG` is invalid or a
/// subscriber is already installed.
pub fn init(debug: bool, format: LogFormat) -> DmountResult<()> {
    let directive: Directive = default_directive(debug)
        .parse()
        .map_err(|e| DmountError::Config {
            message: format!("invalid log directive: {e}"),
        })?;
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|e| match std::env::var_os(LOG_ENV) {
            Some(_) => Err(e),
            None => Ok(EnvFilter::default()),
        })
        .map_err(|e| DmountError::Config {
            message: format!("invalid {LOG_ENV}: {e}"),
        })?
        .add_directive(directive);

    let text = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_ansi(io::stderr().is_terminal())
    });
    let json = (format == LogFormat::Json).then(|| fmt::layer().json().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .try_init()
        .map_err(|e| DmountError::Config {
            message: format!("cannot install logger: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives() {
        assert_eq!(default_directive(false), "dmount=info");
        assert_eq!(default_directive(true), "dmount=debug");
        assert!(default_directive(true).parse::<Directive>().is_ok());
    }

    #[test]
    fn log_format_values() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("text", true).unwrap(), LogFormat::Text);
        assert!(LogFormat::from_str("xml", true).is_err());
    }
}
