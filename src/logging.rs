//! Subscriber setup for applications embedding the store.
//!
//! The library only emits events. `init_tracing` installs a global
//! subscriber that shows `file_store` events at the configured level and
//! everything else at warn; `FILE_STORE_LOG` appends extra EnvFilter
//! directives (`file_store::resume=trace`). Output goes to stderr, and also
//! to a non-blocking append-only file when one is given.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::env;
use std::fmt as stdfmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tsfmt, registry};

use crate::config::{LoadedConfig, LogLevel, path_has_symlink_ancestor};
use crate::platform::open_log_file_secure_append;

/// Extra EnvFilter directives appended to the level-derived ones.
pub const LOG_ENV_VAR: &str = "FILE_STORE_LOG";

const TARGETS: [&str; 3] = ["file_store::fs_ops", "file_store::resume", "file_store::config"];

/// UTC wall clock with milliseconds, the resolution store timestamps use.
struct UtcMillis;

impl FormatTime for UtcMillis {
    fn format_time(&self, w: &mut Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// Filter directives for `level`: store targets at the level, other crates
/// at warn (error when quiet).
pub fn filter_directives(level: &LogLevel) -> String {
    let (base, ours) = match level {
        LogLevel::Quiet => ("error", "error"),
        LogLevel::Normal => ("warn", "info"),
        LogLevel::Info => ("warn", "debug"),
        LogLevel::Debug => ("warn", "trace"),
    };
    let mut directives = String::from(base);
    for target in TARGETS {
        directives.push_str(&format!(",{target}={ours}"));
    }
    directives
}

fn build_filter(level: &LogLevel) -> Result<EnvFilter> {
    let mut directives = filter_directives(level);
    if let Some(extra) = env::var(LOG_ENV_VAR).ok().filter(|s| !s.trim().is_empty()) {
        directives.push(',');
        directives.push_str(extra.trim());
    }
    EnvFilter::try_new(&directives).with_context(|| format!("invalid log filter '{directives}'"))
}

fn fmt_layer<S, W>(json: bool, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tsfmt::layer()
        .with_timer(UtcMillis)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.compact().boxed()
    }
}

/// Open `path` for appending behind a background writer thread. Symlinked
/// ancestors are refused.
fn open_file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    if path_has_symlink_ancestor(path)
        .with_context(|| format!("check log path '{}'", path.display()))?
    {
        bail!("refusing to log to '{}': an ancestor is a symlink", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory '{}'", parent.display()))?;
    }
    let file = open_log_file_secure_append(path)
        .with_context(|| format!("open log file '{}'", path.display()))?;
    Ok(tracing_appender::non_blocking(file))
}

/// Install the global subscriber. Returns the file writer's guard when
/// `log_file` is set; hold it until exit so buffered lines are flushed.
/// Fails if the log file cannot be opened or a global subscriber exists.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(lvl)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
        vec![fmt_layer(json, io::stderr, true)];
    let guard = match log_file {
        Some(path) => {
            let (writer, guard) = open_file_writer(path)?;
            layers.push(fmt_layer(json, writer, false));
            Some(guard)
        }
        None => None,
    };

    registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("install global tracing subscriber")?;
    Ok(guard)
}

impl LoadedConfig {
    /// `init_tracing` with the level and file from the config (level
    /// defaults to normal).
    pub fn init_logging(&self, json: bool) -> Result<Option<WorkerGuard>> {
        init_tracing(
            &self.log_level.unwrap_or_default(),
            self.log_file.as_deref(),
            json,
        )
    }
}
