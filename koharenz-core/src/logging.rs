//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup. `RUST_LOG` takes precedence over the
//! configured level. Output goes to stderr unless a log file is given, so it
//! never mixes with streamed replies on stdout.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Unrecognised log level '{0}'")]
    InvalidLevel(String),

    #[error("Failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set subscriber: {0}")]
    Init(String),
}

/// Initialise the global subscriber at `level` (`error` … `trace`).
pub fn init(level: &str, log_file: Option<&Path>) -> Result<(), LogError> {
    parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| LogError::InvalidLevel(level.to_string()))?;

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogError::File {
                    path: path.to_path_buf(),
                    source,
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init()
        .map_err(|e| LogError::Init(e.to_string()))
}

pub fn parse_level(level: &str) -> Result<LevelFilter, LogError> {
    if level.trim().is_empty() {
        return Err(LogError::InvalidLevel(level.to_string()));
    }
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| LogError::InvalidLevel(level.to_string()))
}

/// Raise `base` by one level per `-v`. `off` is the lowest rung; an
/// unknown base counts as `info`.
pub fn with_verbosity(base: &str, verbose: u8) -> String {
    const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];
    let start = LEVELS
        .iter()
        .position(|l| l.eq_ignore_ascii_case(base.trim()))
        .unwrap_or(3);
    LEVELS[(start + verbose as usize).min(LEVELS.len() - 1)].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_levels_parse() {
        for l in ["error", "warn", "info", "debug", "trace", "off", "INFO"] {
            assert!(parse_level(l).is_ok(), "expected '{l}' to be valid");
        }
    }

    #[test]
    fn invalid_level_errors() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("").is_err());
    }

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(with_verbosity("info", 0), "info");
        assert_eq!(with_verbosity("info", 1), "debug");
        assert_eq!(with_verbosity("warn", 9), "trace");
        assert_eq!(with_verbosity("nonsense", 1), "debug");
    }

    #[test]
    fn verbosity_climbs_from_off() {
        assert_eq!(with_verbosity("off", 0), "off");
        assert_eq!(with_verbosity("off", 1), "error");
        assert_eq!(with_verbosity("OFF", 3), "info");
    }

    #[test]
    fn init_succeeds_or_already_init() {
        // Another test may have installed a subscriber first; both outcomes are fine.
        match init("info", None) {
            Ok(()) | Err(LogError::Init(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
