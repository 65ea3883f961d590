//! Tracing setup: console plus append-only log file.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins over `settings.log_level` when present.
pub fn init_tracing(service: &str, settings: &Settings) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let log_path = Path::new(&settings.log_file);
        if let Some(dir) = log_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&settings.log_level))
            .context("invalid log level")?;
        let console_layer = if settings.json_log {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .boxed()
        };
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(file));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;
        Ok(())
    })?;
    info!(target: "telemetry", service, log_file = %settings.log_file, "tracing initialized");
    Ok(())
}
