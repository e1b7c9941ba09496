//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem once at process start
//! - Console output in the configured format
//! - Optional rolling file output
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level from `RUST_LOG` if set, otherwise from config
//! - File output goes through a non-blocking writer; the returned guard
//!   flushes it on drop

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{FileLogConfig, LogFormat, LogRotation, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter `{directive}`: {reason}")]
    Filter { directive: String, reason: String },

    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install global subscriber: {0}")]
    Init(String),
}

/// Keeps background log writers alive. Hold it until the process exits.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.level)?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config.format)];
    let mut file_guard = None;

    if let Some(file) = &config.file {
        let (layer, guard) = file_layer(file)?;
        layers.push(layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| LoggingError::Filter {
            directive: level.to_string(),
            reason: e.to_string(),
        })
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    }
}

fn file_layer(file: &FileLogConfig) -> Result<(BoxedLayer, WorkerGuard), LoggingError> {
    let directory = PathBuf::from(&file.directory);
    std::fs::create_dir_all(&directory).map_err(|source| LoggingError::Directory {
        path: directory.clone(),
        source,
    })?;

    let appender = match file.rotation {
        LogRotation::Hourly => rolling::hourly(&directory, &file.file_name_prefix),
        LogRotation::Daily => rolling::daily(&directory, &file.file_name_prefix),
        LogRotation::Never => rolling::never(&directory, &file.file_name_prefix),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_filter() {
        // RUST_LOG is consulted first; only meaningful when it is unset.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter("rag_service=loud").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
    }

    #[test]
    fn file_layer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("logs");
        let config = FileLogConfig {
            directory: target.to_string_lossy().into_owned(),
            file_name_prefix: "test.log".to_string(),
            rotation: LogRotation::Never,
        };
        let (_layer, _guard) = file_layer(&config).unwrap();
        assert!(target.is_dir());
    }
}
