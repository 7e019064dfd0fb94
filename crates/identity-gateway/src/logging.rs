//! Tracing subscriber setup.
//!
//! The filter comes from `RUST_LOG` when set, else from the configured level.
//! Stdout output is plain or JSON per [`LogFormat`]; file logging adds a
//! second JSON layer.

use crate::config::{LogFormat, LoggingConfig};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("global subscriber already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// # Errors
///
/// `LoggingError` if the filter is invalid, the log file cannot be opened,
/// or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level)?;

    let (simple, json) = match config.format {
        LogFormat::Json => (None, Some(fmt::layer().json())),
        LogFormat::Simple => (Some(fmt::layer()), None),
    };

    let file = if config.enable_file_logging {
        let writer = open_log_file(&config.file_path)?;
        Some(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(writer)))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(simple)
        .with(json)
        .with(file)
        .try_init()?;

    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let file_error = |source| LoggingError::File {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(file_error)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(file_error)
}
