//! Tracing setup for the `bz2fb` binary and its tests.
//!
//! Console output goes to stderr so that `--json` reports on stdout stay
//! machine readable. `--log-file` adds a JSON copy of every event. `ureq`
//! logs through the `log` crate; those records are bridged into tracing and
//! only shown once `-vv` asks for the HTTP exchange.

use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Mutex, Once};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// How much the run reports, derived from `-q` and the `-v` count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Errors only.
    Quiet,
    /// Progress milestones: login, reference counts, per-case mutations.
    Normal,
    /// Every request and lookup decision.
    Verbose,
    /// Adds the HTTP client's own connection logging.
    Wire,
    Trace,
}

impl LogLevel {
    /// `-q` wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        match (quiet, verbosity) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, 2) => Self::Wire,
            (false, _) => Self::Trace,
        }
    }

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[must_use]
    pub const fn directives(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "bz2fb=info",
            Self::Verbose => "bz2fb=debug",
            Self::Wire => "bz2fb=debug,ureq=debug",
            Self::Trace => "bz2fb=trace,ureq=trace",
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level picked by the flags.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the log file cannot be
/// created, or a subscriber is already installed.
pub fn init_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = LogLevel::from_flags(verbosity, quiet);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.directives()))
        .context("invalid log filter")?;

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(level >= LogLevel::Verbose)
        .with_file(cfg!(debug_assertions))
        .with_line_number(cfg!(debug_assertions))
        .with_ansi(std::io::stderr().is_terminal());

    let json_file = log_file
        .map(|path| {
            File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))
        })
        .transpose()?
        .map(|file| {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(Mutex::new(file))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(json_file)
        .try_init()
        .context("a tracing subscriber is already installed")
}

/// Route crate events at debug level into the test harness's captured output.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(LogLevel::Verbose.directives())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(LogLevel::from_flags(3, true), LogLevel::Quiet);
        assert_eq!(LogLevel::Quiet.directives(), "error");
    }

    #[test]
    fn http_client_logging_starts_at_two_flags() {
        assert!(!LogLevel::from_flags(1, false).directives().contains("ureq"));
        assert_eq!(LogLevel::from_flags(2, false), LogLevel::Wire);
        assert!(LogLevel::Wire.directives().contains("ureq=debug"));
        assert_eq!(LogLevel::from_flags(9, false), LogLevel::Trace);
    }

    #[test]
    fn every_level_is_a_valid_filter() {
        for level in [
            LogLevel::Quiet,
            LogLevel::Normal,
            LogLevel::Verbose,
            LogLevel::Wire,
            LogLevel::Trace,
        ] {
            assert!(EnvFilter::try_new(level.directives()).is_ok(), "{level:?}");
        }
    }
}
