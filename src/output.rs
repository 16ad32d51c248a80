use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::organizer::{BatchResult, FileOutcome, Status};
use crate::report::ReportSink;

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {}", msg);
    }
}

pub fn print_warn(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {}", msg);
    }
}

pub fn print_error(msg: &str) {
    if is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {}", msg);
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {}", msg);
    }
}

/// Print a plain user-facing line (no prefix). Use this for primary outputs
/// such as outcome lines which users may script against.
pub fn print_user(msg: &str) {
    println!("{}", msg);
}

/// One line per file: `STATUS  source -> destination`.
pub fn outcome_line(outcome: &FileOutcome) -> String {
    let status = outcome.status();
    let mut line = format!("{:<22} {}", status.to_string(), outcome.source.display());
    if let Some(dest) = outcome.destination() {
        let arrow = if matches!(status, Status::Skipped(_)) { "==" } else { "->" };
        line.push_str(&format!(" {arrow} {}", dest.display()));
    }
    if let Some(err) = &outcome.error {
        line.push_str(&format!(" ({err})"));
    }
    line
}

pub fn summary_line(result: &BatchResult) -> String {
    let verb = if result.preview { "would move" } else { "moved" };
    let mut s = format!(
        "{} {verb}, {} skipped, {} failed in {:.2}s",
        result.moved,
        result.skipped,
        result.failed,
        result.elapsed.as_secs_f64()
    );
    if result.cancelled {
        s.push_str(" (interrupted)");
    }
    s
}

/// Prints outcomes to the terminal as they arrive.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    /// Stop printing file lines after this many (the summary is always printed).
    limit: Option<usize>,
    printed: AtomicUsize,
}

impl ConsoleSink {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            printed: AtomicUsize::new(0),
        }
    }
}

impl ReportSink for ConsoleSink {
    fn on_file_outcome(&self, outcome: &FileOutcome) {
        let n = self.printed.fetch_add(1, Ordering::Relaxed);
        if self.limit.is_some_and(|l| n >= l) {
            return;
        }
        let line = outcome_line(outcome);
        match outcome.status() {
            Status::Failed(_) => print_error(&line),
            _ => print_user(&line),
        }
    }

    fn on_batch_complete(&self, result: &BatchResult) {
        let shown = self.printed.load(Ordering::Relaxed);
        if let Some(l) = self.limit
            && shown > l
        {
            print_info(&format!("... {} more not shown", shown - l));
        }
        let line = summary_line(result);
        if result.failed > 0 {
            print_warn(&line);
        } else {
            print_success(&line);
        }
    }
}
