//! Where outcomes go while a batch or watcher runs.
//!
//! Sinks are called inline from the organizing thread, so they must return
//! quickly. `QueuedSink` hands owned records to another thread through a
//! bounded channel and drops (and counts) when the consumer falls behind.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::time::Duration;
use tracing::{info, warn};

use crate::organizer::{BatchResult, FileOutcome, Status};

pub trait ReportSink: Send + Sync {
    fn on_file_outcome(&self, outcome: &FileOutcome);
    fn on_batch_complete(&self, result: &BatchResult);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn on_file_outcome(&self, _outcome: &FileOutcome) {}
    fn on_batch_complete(&self, _result: &BatchResult) {}
}

/// Structured audit events through `tracing` (target `tidy_move::audit`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn on_file_outcome(&self, outcome: &FileOutcome) {
        let status = outcome.status();
        let src = outcome.source.display();
        let dest = outcome
            .destination()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        let category = outcome.category().unwrap_or("");
        match &outcome.error {
            Some(err) => warn!(
                target: "tidy_move::audit",
                %status,
                src = %src,
                dest = %dest,
                category,
                kind = err.kind(),
                code = err.code(),
                error = %err,
                "file outcome"
            ),
            None => info!(
                target: "tidy_move::audit",
                %status,
                src = %src,
                dest = %dest,
                category,
                method = outcome.method.map(|m| m.as_str()).unwrap_or(""),
                "file outcome"
            ),
        }
    }

    fn on_batch_complete(&self, result: &BatchResult) {
        info!(
            target: "tidy_move::audit",
            source = %result.source_dir.display(),
            target_root = %result.target_root.display(),
            preview = result.preview,
            moved = result.moved,
            skipped = result.skipped,
            failed = result.failed,
            cancelled = result.cancelled,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "batch complete"
        );
    }
}

/// Forwards every event to each inner sink in order.
pub struct FanOut(pub Vec<Box<dyn ReportSink>>);

impl ReportSink for FanOut {
    fn on_file_outcome(&self, outcome: &FileOutcome) {
        for s in &self.0 {
            s.on_file_outcome(outcome);
        }
    }

    fn on_batch_complete(&self, result: &BatchResult) {
        for s in &self.0 {
            s.on_batch_complete(result);
        }
    }
}

/// Owned copy of a `FileOutcome` that can cross threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub category: Option<String>,
    pub status: Status,
    pub message: Option<String>,
}

impl From<&FileOutcome> for OutcomeRecord {
    fn from(o: &FileOutcome) -> Self {
        Self {
            source: o.source.clone(),
            destination: o.destination().map(PathBuf::from),
            category: o.category().map(str::to_string),
            status: o.status(),
            message: o.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub source_dir: PathBuf,
    pub target_root: PathBuf,
    pub preview: bool,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl From<&BatchResult> for BatchSummary {
    fn from(r: &BatchResult) -> Self {
        Self {
            source_dir: r.source_dir.clone(),
            target_root: r.target_root.clone(),
            preview: r.preview,
            moved: r.moved,
            skipped: r.skipped,
            failed: r.failed,
            cancelled: r.cancelled,
            elapsed: r.elapsed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    File(OutcomeRecord),
    BatchComplete(BatchSummary),
}

/// Bounded, non-blocking hand-off to a consumer thread.
#[derive(Debug)]
pub struct QueuedSink {
    tx: SyncSender<ReportEvent>,
    dropped: AtomicU64,
}

impl QueuedSink {
    pub fn bounded(capacity: usize) -> (Self, Receiver<ReportEvent>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Events lost because the queue was full or the receiver was gone.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, event: ReportEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl ReportSink for QueuedSink {
    fn on_file_outcome(&self, outcome: &FileOutcome) {
        self.push(ReportEvent::File(outcome.into()));
    }

    fn on_batch_complete(&self, result: &BatchResult) {
        self.push(ReportEvent::BatchComplete(result.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organizer::{OrganizeOptions, organize_batch};
    use crate::rules::RuleSet;
    use crate::shutdown::CancelToken;
    use std::fs;
    use tempfile::tempdir;

    fn three_files() -> (tempfile::TempDir, tempfile::TempDir) {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        for n in ["a.txt", "b.txt", "c.txt"] {
            fs::write(src.path().join(n), n).unwrap();
        }
        (src, dst)
    }

    #[test]
    fn queued_sink_streams_files_then_summary() {
        let (src, dst) = three_files();
        let rules = RuleSet::new([("Documents", vec!["txt"])], "Other").unwrap();
        let (sink, rx) = QueuedSink::bounded(16);
        let opts = OrganizeOptions::new(dst.path());
        organize_batch(src.path(), &rules, &opts, false, &sink, &CancelToken::new()).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ReportEvent::File(ref r) if r.status == Status::Moved));
        assert!(matches!(events[3], ReportEvent::BatchComplete(ref s) if s.moved == 3));
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (src, dst) = three_files();
        let rules = RuleSet::new([("Documents", vec!["txt"])], "Other").unwrap();
        let (sink, rx) = QueuedSink::bounded(1);
        let opts = OrganizeOptions::new(dst.path());
        let res =
            organize_batch(src.path(), &rules, &opts, false, &sink, &CancelToken::new()).unwrap();
        // The batch itself is unaffected by the slow consumer.
        assert_eq!(res.moved, 3);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(sink.dropped(), 3);
    }

    #[test]
    fn fan_out_reaches_every_sink() {
        let (src, dst) = three_files();
        let rules = RuleSet::new([("Documents", vec!["txt"])], "Other").unwrap();
        let (a, rx_a) = QueuedSink::bounded(8);
        let (b, rx_b) = QueuedSink::bounded(8);
        let fan = FanOut(vec![Box::new(a), Box::new(TracingSink), Box::new(b)]);
        let opts = OrganizeOptions::new(dst.path());
        organize_batch(src.path(), &rules, &opts, true, &fan, &CancelToken::new()).unwrap();
        assert_eq!(rx_a.try_iter().count(), 4);
        assert_eq!(rx_b.try_iter().count(), 4);
    }
}
