//! Tracing subscriber setup.
//!
//! Built once by the binary from explicit settings; library code only uses the
//! `tracing` macros and the spans handed to it.

use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{GatewayError, Result};

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Console filter directive, e.g. `info` or `poe_gateway=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub console_level: String,
    pub file_level: String,
    pub file_path: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console_level: "info".into(),
            file_level: "info".into(),
            file_path: None,
        }
    }
}

/// Keeps the background file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| GatewayError::Logging(format!("invalid log level {directive:?}: {e}")))
}

/// Install the global subscriber: a colored console layer plus, when a file
/// path is set, a plain-text file layer with source locations.
pub fn init(settings: &LogSettings) -> Result<LogGuard> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => filter(&settings.console_level)?,
    };
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_filter(console_filter);

    let (file_layer, guard) = match &settings.file_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter(&settings.file_level)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| GatewayError::Logging(e.to_string()))?;

    if let Some(path) = &settings.file_path {
        tracing::info!(path = %path.display(), "file logging enabled");
    }

    Ok(LogGuard { _file: guard })
}
