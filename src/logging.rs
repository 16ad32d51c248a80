//! Subscriber setup for the binary.
//!
//! Events go to stderr so stdout carries only the outcome listing. `--json`
//! switches every sink to JSON lines. A configured `log_file` adds a
//! non-blocking file layer, unless one of its parent directories is a symlink.

use anyhow::{Result, bail};
use chrono::Local;
use std::fmt as stdfmt;
use std::path::Path;
use tidy_move::output as out;
use tidy_move::platform::open_log_file_secure_append;
use tidy_move::{LogLevel, default_log_path, path_has_symlink_ancestor};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tsfmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Local wall clock, `16/10/26 14:03:09`.
struct LocalClock;

impl FormatTime for LocalClock {
    fn format_time(&self, w: &mut Writer<'_>) -> stdfmt::Result {
        write!(w, "{}", Local::now().format("%d/%m/%y %H:%M:%S"))
    }
}

fn level_filter(lvl: &LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Quiet => LevelFilter::ERROR,
        LogLevel::Normal => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    }
}

/// Our events at the chosen level; dependencies (watch backends) from warn up.
fn crate_filter(lvl: &LogLevel) -> EnvFilter {
    EnvFilter::new(format!("warn,tidy_move={}", level_filter(lvl)))
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        tsfmt::layer()
            .json()
            .with_timer(LocalClock)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tsfmt::layer()
            .compact()
            .with_timer(LocalClock)
            .with_writer(std::io::stderr)
            .boxed()
    }
}

fn file_layer(writer: NonBlocking, json: bool) -> BoxedLayer {
    if json {
        tsfmt::layer()
            .json()
            .with_thread_ids(true)
            .with_timer(LocalClock)
            .with_writer(writer)
            .boxed()
    } else {
        tsfmt::layer()
            .compact()
            .with_thread_ids(true)
            .with_ansi(false)
            .with_timer(LocalClock)
            .with_writer(writer)
            .boxed()
    }
}

/// Append-only, non-blocking writer for the log file.
fn open_log_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    match path_has_symlink_ancestor(path) {
        Ok(true) => bail!("a parent directory is a symlink"),
        Err(e) => bail!("could not check parent directories: {e}"),
        Ok(false) => {}
    }
    let file = open_log_file_secure_append(path)?;
    Ok(tracing_appender::non_blocking(file))
}

/// Install the global subscriber. The returned guard flushes the file layer
/// on drop and must live until the process is done logging.
pub fn init_tracing(
    lvl: &LogLevel,
    log_file: Option<&Path>,
    json: bool,
) -> Result<Option<WorkerGuard>> {
    let mut layers = vec![console_layer(json)];
    let mut guard = None;

    if let Some(path) = log_file {
        match open_log_writer(path) {
            Ok((writer, g)) => {
                layers.push(file_layer(writer, json));
                guard = Some(g);
            }
            Err(e) => {
                out::print_warn(&format!(
                    "Not logging to '{}': {e:#}. Logs stay on stderr.",
                    path.display()
                ));
                if let Some(def) = default_log_path().filter(|d| d != path) {
                    out::print_info(&format!("The default log file is {}", def.display()));
                }
            }
        }
    }

    registry().with(layers).with(crate_filter(lvl)).try_init()?;
    Ok(guard)
}
