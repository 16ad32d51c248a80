//! Monitor mode: IDLE → WATCHING → STOPPED.
//!
//! `notify-debouncer-full` holds each new path for the settle delay and folds
//! the writes that follow a create into one event. Settled events go to a
//! worker thread that runs them through the same `organize_path` a batch
//! uses. The settle delay is a heuristic: a producer that pauses longer than
//! the delay mid-write can still be picked up early.
//!
//! The debouncer discards whatever it still holds when it is stopped, so
//! `stop()` unwatches the directory first and waits one settle period (plus a
//! debouncer tick) before shutting it down.

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::MonitorSettings;
use crate::errors::TidyMoveError;
use crate::organizer::{OrganizeOptions, in_destination, organize_path};
use crate::report::ReportSink;
use crate::rules::RuleSet;
use crate::shutdown::CancelToken;

/// A zero timeout would spin the debouncer's tick loop.
const MIN_SETTLE: Duration = Duration::from_millis(10);
/// Margin on top of settle + tick when waiting for the debouncer to flush.
const FLUSH_SLACK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// How long a new path is held before it is organized.
    pub settle_delay: Duration,
    pub recursive: bool,
    /// How long `stop()` waits for pending paths to be handled.
    pub drain_timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            settle_delay: crate::config::SETTLE_DELAY_DEFAULT,
            recursive: false,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&MonitorSettings> for WatchOptions {
    fn from(m: &MonitorSettings) -> Self {
        Self {
            settle_delay: m.settle_delay,
            recursive: m.recursive,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
    Stopped,
}

enum Msg {
    Settled(DebounceEventResult),
    Stop,
}

struct Running {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    directory: PathBuf,
    /// Time for the debouncer to release everything it holds.
    flush_wait: Duration,
    tx: Sender<Msg>,
    done_rx: Receiver<()>,
    worker: JoinHandle<()>,
    cancel: CancelToken,
    drain_timeout: Duration,
}

pub struct Watcher {
    state: WatchState,
    running: Option<Running>,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    pub fn new() -> Self {
        Self {
            state: WatchState::Idle,
            running: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Subscribe to `directory` and organize new files into `options.target_root`.
    pub fn start(
        &mut self,
        directory: &Path,
        rules: RuleSet,
        options: OrganizeOptions,
        watch: WatchOptions,
        sink: Arc<dyn ReportSink>,
    ) -> Result<(), TidyMoveError> {
        if self.state != WatchState::Idle {
            return Err(TidyMoveError::InvalidState("start requires an idle watcher"));
        }

        let directory = std::path::absolute(directory).map_err(|e| {
            TidyMoveError::SourceDirUnreadable {
                path: directory.to_path_buf(),
                source: e,
            }
        })?;
        fs::read_dir(&directory).map_err(|e| TidyMoveError::SourceDirUnreadable {
            path: directory.clone(),
            source: e,
        })?;
        let mut options = options;
        options.target_root = std::path::absolute(&options.target_root).map_err(|e| {
            TidyMoveError::DestinationUnwritable {
                path: options.target_root.clone(),
                source: e,
            }
        })?;
        fs::create_dir_all(&options.target_root).map_err(|e| {
            TidyMoveError::DestinationUnwritable {
                path: options.target_root.clone(),
                source: e,
            }
        })?;

        let (tx, rx) = mpsc::channel::<Msg>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let cancel = CancelToken::new();
        let worker_ctx = Worker {
            directory: directory.clone(),
            rules,
            options,
            sink,
            cancel: cancel.clone(),
        };
        let worker = thread::Builder::new()
            .name("tidy-move-watch".into())
            .spawn(move || {
                worker_ctx.run(rx);
                let _ = done_tx.send(());
            })
            .map_err(|e| TidyMoveError::Io {
                op: "spawn watch worker",
                path: directory.clone(),
                source: e,
            })?;

        let settle = watch.settle_delay.max(MIN_SETTLE);
        let handler_tx = tx.clone();
        let subscribe = || -> notify::Result<Debouncer<RecommendedWatcher, RecommendedCache>> {
            let mut debouncer = new_debouncer(settle, None, move |res: DebounceEventResult| {
                let _ = handler_tx.send(Msg::Settled(res));
            })?;
            let mode = if watch.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            debouncer.watch(&directory, mode)?;
            Ok(debouncer)
        };
        let debouncer = match subscribe() {
            Ok(d) => d,
            Err(e) => {
                let _ = tx.send(Msg::Stop);
                let _ = worker.join();
                return Err(TidyMoveError::Watch(e));
            }
        };

        info!(
            directory = %directory.display(),
            recursive = watch.recursive,
            settle_ms = settle.as_millis() as u64,
            "watching"
        );
        self.running = Some(Running {
            debouncer,
            directory,
            // The debouncer ticks at a quarter of its timeout.
            flush_wait: settle + settle / 4 + FLUSH_SLACK,
            tx,
            done_rx,
            worker,
            cancel,
            drain_timeout: watch.drain_timeout,
        });
        self.state = WatchState::Watching;
        Ok(())
    }

    /// Stop taking new events, let pending paths settle and be handled, up to
    /// the drain timeout. Stopping twice is a no-op.
    pub fn stop(&mut self) -> Result<(), TidyMoveError> {
        match self.state {
            WatchState::Idle => Err(TidyMoveError::InvalidState("watcher was never started")),
            WatchState::Stopped => Ok(()),
            WatchState::Watching => {
                self.state = WatchState::Stopped;
                let Some(mut run) = self.running.take() else {
                    return Ok(());
                };
                let deadline = Instant::now() + run.drain_timeout;
                if let Err(e) = run.debouncer.unwatch(&run.directory) {
                    debug!(error = %e, "unwatch failed; stopping anyway");
                }
                thread::sleep(run.flush_wait.min(run.drain_timeout));
                run.debouncer.stop();
                let _ = run.tx.send(Msg::Stop);
                drop(run.tx);
                let remaining = deadline.saturating_duration_since(Instant::now());
                match run.done_rx.recv_timeout(remaining) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        let _ = run.worker.join();
                        info!("watcher stopped");
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        // The worker finishes its current file and then exits on its own.
                        run.cancel.cancel();
                        warn!(
                            timeout_ms = run.drain_timeout.as_millis() as u64,
                            "watcher drain timed out; abandoning pending paths"
                        );
                    }
                }
                Ok(())
            }
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if self.state == WatchState::Watching {
            let _ = self.stop();
        }
    }
}

struct Worker {
    directory: PathBuf,
    rules: RuleSet,
    options: OrganizeOptions,
    sink: Arc<dyn ReportSink>,
    cancel: CancelToken,
}

impl Worker {
    fn run(&self, rx: Receiver<Msg>) {
        while let Ok(msg) = rx.recv() {
            match msg {
                Msg::Settled(Ok(events)) => {
                    let mut seen = HashSet::new();
                    for event in &events {
                        trace!(kind = ?event.kind, paths = ?event.paths, "settled event");
                        for path in arrivals(event) {
                            if self.cancel.is_cancelled() {
                                return;
                            }
                            if seen.insert(path.clone()) {
                                self.dispatch(&path);
                            }
                        }
                    }
                }
                Msg::Settled(Err(errors)) => {
                    for e in errors {
                        warn!(error = %e, "watch error");
                    }
                }
                Msg::Stop => {
                    debug!("watch worker drained");
                    return;
                }
            }
        }
    }

    fn dispatch(&self, path: &Path) {
        match fs::symlink_metadata(path) {
            Ok(m) if m.is_dir() => return,
            Ok(_) => {}
            Err(_) => {
                trace!(path = %path.display(), "gone before it settled");
                return;
            }
        }
        if in_destination(path, &self.directory, &self.options.target_root, &self.rules) {
            return;
        }
        let outcome = organize_path(path, &self.rules, &self.options, false);
        debug!(src = %path.display(), status = %outcome.status(), "settled path organized");
        self.sink.on_file_outcome(&outcome);
    }
}

/// Paths an event brings into the watched tree.
fn arrivals(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.clone()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        // Some backends only report "renamed" without a direction.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().filter(|p| p.exists()).cloned().collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullSink;
    use tempfile::tempdir;

    fn rules() -> RuleSet {
        RuleSet::new([("Documents", vec!["txt"])], "Other").unwrap()
    }

    #[test]
    fn arrivals_follow_creates_and_renames_in() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.txt");
        let b = td.path().join("b.txt");
        fs::write(&b, b"x").unwrap();

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(a.clone());
        assert_eq!(arrivals(&create), vec![a.clone()]);
        let folder = Event::new(EventKind::Create(CreateKind::Folder)).add_path(a.clone());
        assert!(arrivals(&folder).is_empty());
        let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(a.clone())
            .add_path(b.clone());
        assert_eq!(arrivals(&renamed), vec![b.clone()]);
        let undirected = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(a.clone())
            .add_path(b.clone());
        assert_eq!(arrivals(&undirected), vec![b]);
        let data = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(a);
        assert!(arrivals(&data).is_empty());
    }

    #[test]
    fn stop_before_start_is_invalid() {
        let mut w = Watcher::new();
        assert!(matches!(w.stop(), Err(TidyMoveError::InvalidState(_))));
        assert_eq!(w.state(), WatchState::Idle);
    }

    #[test]
    fn start_twice_is_invalid_and_stop_twice_is_noop() {
        let td = tempdir().unwrap();
        let mut w = Watcher::new();
        w.start(
            td.path(),
            rules(),
            OrganizeOptions::new(td.path()),
            WatchOptions::default(),
            Arc::new(NullSink),
        )
        .unwrap();
        assert_eq!(w.state(), WatchState::Watching);
        let again = w.start(
            td.path(),
            rules(),
            OrganizeOptions::new(td.path()),
            WatchOptions::default(),
            Arc::new(NullSink),
        );
        assert!(matches!(again, Err(TidyMoveError::InvalidState(_))));
        w.stop().unwrap();
        assert_eq!(w.state(), WatchState::Stopped);
        w.stop().unwrap();
        // A stopped watcher does not restart.
        let restart = w.start(
            td.path(),
            rules(),
            OrganizeOptions::new(td.path()),
            WatchOptions::default(),
            Arc::new(NullSink),
        );
        assert!(restart.is_err());
    }

    #[test]
    fn missing_directory_fails_to_start() {
        let td = tempdir().unwrap();
        let mut w = Watcher::new();
        let err = w
            .start(
                &td.path().join("nope"),
                rules(),
                OrganizeOptions::new(td.path()),
                WatchOptions::default(),
                Arc::new(NullSink),
            )
            .unwrap_err();
        assert!(matches!(err, TidyMoveError::SourceDirUnreadable { .. }));
        assert_eq!(w.state(), WatchState::Idle);
    }
}
