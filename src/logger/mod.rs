//! Logger Module
//!
//! Installs the global `tracing` subscriber from `[logger]` settings:
//! - Console output with color control
//! - File output in full, compact or JSON format
//!
//! `RUST_LOG` takes precedence over the configured level when set.

pub mod error;

pub use error::LoggerError;

use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{FileSettings, LogFormat, LoggerSettings};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global logger
///
/// # Errors
/// Invalid settings, an unopenable log file, or a subscriber already installed.
pub fn init_logger(settings: &LoggerSettings) -> anyhow::Result<()> {
    settings
        .validate()
        .map_err(|e| LoggerError::config(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // The file layer goes first so ANSI codes from the console layer do not
    // end up in span fields written to the file.
    let mut layers: Vec<BoxedLayer> = Vec::new();
    if settings.file.enabled {
        layers.push(file_layer(&settings.file)?);
    }
    if settings.console.enabled {
        let use_ansi = settings.console.colored && std::io::stdout().is_terminal();
        layers.push(fmt::layer().with_ansi(use_ansi).with_target(true).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    Ok(())
}

fn file_layer(settings: &FileSettings) -> Result<BoxedLayer, LoggerError> {
    let writer = Mutex::new(open_log_file(settings)?);
    let base = fmt::layer().with_ansi(false);

    Ok(match settings.format {
        LogFormat::Full => base.with_writer(writer).boxed(),
        LogFormat::Compact => base.compact().with_writer(writer).boxed(),
        LogFormat::Json => base.json().with_writer(writer).boxed(),
    })
}

/// Opens the log file, creating parent directories as needed.
fn open_log_file(settings: &FileSettings) -> Result<File, LoggerError> {
    let open_error = |source| LoggerError::OpenFile {
        path: settings.path.clone(),
        source,
    };

    if let Some(parent) = settings.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(open_error)?;
    }

    OpenOptions::new()
        .create(true)
        .write(true)
        .append(settings.append)
        .truncate(!settings.append)
        .open(&settings.path)
        .map_err(open_error)
}
