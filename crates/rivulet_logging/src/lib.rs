//! Shared logging setup for Rivulet binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "rivulet=info,rivulet_schema=info,rivulet_storage=info";

/// Directory override for the optional plain-file log layer.
const LOG_DIR_ENV: &str = "RIVULET_LOG_DIR";

/// Logging configuration shared by Rivulet binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with stderr output and, when `RIVULET_LOG_DIR` is
/// set, an append-only plain file per binary.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_LOG_FILTER)
        }
    });

    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter),
    );

    match log_file(config.app_name)? {
        Some(file) => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_filter(EnvFilter::new(DEFAULT_LOG_FILTER)),
                )
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}

fn log_file(app_name: &str) -> Result<Option<Arc<File>>> {
    let dir = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return Ok(None),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    let path = dir.join(format!("{}.log", sanitize_name(app_name)));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    Ok(Some(Arc::new(file)))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
