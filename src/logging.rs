//! Tracing subscriber setup.
//!
//! Every event the driver emits carries a `tag` field naming the operation
//! (`Connect`, `PulseGuide`, `Goto`, ...). `RUST_LOG` takes precedence over the
//! configured level.

use crate::config::{LogFormat, LoggingConfig};
use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Log file path '{0}' has no file name")]
    BadFilePath(String),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// The filter directive for `config`, widened to debug for this crate when
/// verbose query logging is on.
pub fn filter_directive(config: &LoggingConfig) -> String {
    if config.verbose {
        format!("{},{}=debug", config.level, env!("CARGO_CRATE_NAME"))
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as file logging should flush.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = filter_directive(config);
            EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter {
                directive,
                source,
            })?
        }
    };

    let (writer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (writer, Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = guard.is_none();

    let layer = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(BoxMakeWriter, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::BadFilePath(path.display().to_string()))?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(writer), guard))
}
