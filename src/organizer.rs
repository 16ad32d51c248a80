//! One file end-to-end (inspect → filter → classify → resolve → move) and
//! batches over a directory.
//!
//! Per-file problems become FAILED outcomes and the batch carries on. Only a
//! source directory that cannot be listed, or a target root that cannot be
//! created, aborts a batch, and that happens before any file is touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::classify::{Classification, classify};
use crate::config::{DATE_FORMAT_DEFAULT, Settings};
use crate::errors::TidyMoveError;
use crate::fs_ops::{self, MoveFailure, MoveMethod};
use crate::record::FileRecord;
use crate::report::ReportSink;
use crate::resolve::{PlannedClaims, Resolution, is_organized_path, resolve_destination};
use crate::rules::{ExclusionReason, RuleSet};
use crate::shutdown::CancelToken;

/// Cap on the collision search per directory.
pub const MAX_SUFFIX_DEFAULT: u32 = 10_000;
/// How often a move re-resolves after losing its destination to another actor.
const TAKEN_RETRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub target_root: PathBuf,
    /// Descend into subdirectories of the source.
    pub recursive: bool,
    pub organize_by_date: bool,
    pub date_format: String,
    /// Keep mtime/atime when a move falls back to copy.
    pub preserve_timestamps: bool,
    pub max_suffix: u32,
}

impl OrganizeOptions {
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        Self {
            target_root: target_root.into(),
            recursive: false,
            organize_by_date: false,
            date_format: DATE_FORMAT_DEFAULT.to_string(),
            preserve_timestamps: true,
            max_suffix: MAX_SUFFIX_DEFAULT,
        }
    }

    pub fn from_settings(target_root: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            organize_by_date: settings.organize_by_date,
            date_format: settings.date_format.clone(),
            preserve_timestamps: settings.preserve_timestamps,
            ..Self::new(target_root)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move,
    SkipExcluded(ExclusionReason),
    SkipDuplicate,
}

/// The plan for one file; identical in preview and real runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: FileRecord,
    /// Free path for a move; the existing identical file for a duplicate;
    /// none for an exclusion.
    pub destination: Option<PathBuf>,
    pub category: Option<String>,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Excluded(ExclusionReason),
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Moved, or in a preview: would move.
    Moved,
    Skipped(SkipReason),
    /// Carries `TidyMoveError::kind()`.
    Failed(&'static str),
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Moved => f.write_str("MOVED"),
            Status::Skipped(SkipReason::Duplicate) => f.write_str("SKIPPED(duplicate)"),
            Status::Skipped(SkipReason::Excluded(r)) => write!(f, "SKIPPED({r})"),
            Status::Failed(kind) => write!(f, "FAILED({kind})"),
        }
    }
}

#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    /// Absent only when the file could not be inspected.
    pub planned: Option<PlannedMove>,
    pub error: Option<TidyMoveError>,
    pub method: Option<MoveMethod>,
}

impl FileOutcome {
    fn failed(source: PathBuf, planned: Option<PlannedMove>, error: TidyMoveError) -> Self {
        Self {
            source,
            planned,
            error: Some(error),
            method: None,
        }
    }

    fn planned(plan: PlannedMove, method: Option<MoveMethod>) -> Self {
        Self {
            source: plan.source.path.clone(),
            planned: Some(plan),
            error: None,
            method,
        }
    }

    pub fn status(&self) -> Status {
        if let Some(e) = &self.error {
            return Status::Failed(e.kind());
        }
        match self.planned.as_ref().map(|p| p.action) {
            Some(Action::SkipExcluded(r)) => Status::Skipped(SkipReason::Excluded(r)),
            Some(Action::SkipDuplicate) => Status::Skipped(SkipReason::Duplicate),
            _ => Status::Moved,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        self.planned.as_ref().and_then(|p| p.destination.as_deref())
    }

    pub fn category(&self) -> Option<&str> {
        self.planned.as_ref().and_then(|p| p.category.as_deref())
    }
}

#[derive(Debug)]
pub struct BatchResult {
    pub source_dir: PathBuf,
    pub target_root: PathBuf,
    pub preview: bool,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Stopped early by a CancelToken; `outcomes` holds what completed.
    pub cancelled: bool,
    pub outcomes: Vec<FileOutcome>,
    pub elapsed: Duration,
}

impl BatchResult {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status() {
            Status::Moved => self.moved += 1,
            Status::Skipped(_) => self.skipped += 1,
            Status::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

enum Mode<'a> {
    Execute,
    Preview(&'a PlannedClaims),
}

/// Run the pipeline for one already-inspected file. In a preview nothing on
/// disk changes.
pub fn organize_one(
    record: FileRecord,
    rules: &RuleSet,
    opts: &OrganizeOptions,
    preview: bool,
) -> FileOutcome {
    if preview {
        let claims = PlannedClaims::new();
        run_pipeline(record, rules, opts, Mode::Preview(&claims))
    } else {
        run_pipeline(record, rules, opts, Mode::Execute)
    }
}

/// Inspect `path` fresh and organize it. Shared by batches and the watcher.
pub fn organize_path(
    path: &Path,
    rules: &RuleSet,
    opts: &OrganizeOptions,
    preview: bool,
) -> FileOutcome {
    match FileRecord::inspect(path) {
        Ok(record) => organize_one(record, rules, opts, preview),
        Err(e) => FileOutcome::failed(path.to_path_buf(), None, e),
    }
}

fn run_pipeline(
    record: FileRecord,
    rules: &RuleSet,
    opts: &OrganizeOptions,
    mode: Mode<'_>,
) -> FileOutcome {
    if let Some(reason) = rules.exclusion_for(&record) {
        return skip_excluded(record, reason);
    }
    let category = match classify(&record.extension, rules) {
        Classification::Excluded => return skip_excluded(record, ExclusionReason::Extension),
        Classification::Category(name) => name,
    };

    let claims = match mode {
        Mode::Preview(c) => Some(c),
        Mode::Execute => None,
    };

    for attempt in 0..=TAKEN_RETRIES {
        let resolution = match resolve_destination(&record, &category, opts, claims) {
            Ok(r) => r,
            Err(e) => {
                let plan = plan(record, None, Some(category), Action::Move);
                return FileOutcome::failed(plan.source.path.clone(), Some(plan), e);
            }
        };
        let dest = match resolution {
            Resolution::Duplicate(existing) => {
                debug!(
                    src = %record.path.display(),
                    existing = %existing.display(),
                    "duplicate; leaving source in place"
                );
                return FileOutcome::planned(
                    plan(record, Some(existing), Some(category), Action::SkipDuplicate),
                    None,
                );
            }
            Resolution::Target(dest) => dest,
        };
        if claims.is_some() {
            let plan = plan(record, Some(dest), Some(category), Action::Move);
            return FileOutcome::planned(plan, None);
        }

        let result = match dest.parent() {
            Some(dir) => fs_ops::ensure_dir(dir).map_err(MoveFailure::Error),
            None => Ok(()),
        }
        .and_then(|()| fs_ops::move_no_clobber(&record.path, &dest, opts.preserve_timestamps));

        match result {
            Ok(method) => {
                return FileOutcome::planned(
                    plan(record, Some(dest), Some(category), Action::Move),
                    Some(method),
                );
            }
            Err(MoveFailure::DestinationTaken) => {
                warn!(
                    dest = %dest.display(),
                    attempt,
                    "destination taken after planning; resolving again"
                );
            }
            Err(MoveFailure::Error(e)) => {
                let plan = plan(record, Some(dest), Some(category), Action::Move);
                return FileOutcome::failed(plan.source.path.clone(), Some(plan), e);
            }
        }
    }

    let dir = opts.target_root.join(&category);
    let err = TidyMoveError::ResolutionExhausted {
        dir,
        name: record.name.clone(),
        attempts: TAKEN_RETRIES + 1,
    };
    let plan = plan(record, None, Some(category), Action::Move);
    FileOutcome::failed(plan.source.path.clone(), Some(plan), err)
}

fn plan(
    source: FileRecord,
    destination: Option<PathBuf>,
    category: Option<String>,
    action: Action,
) -> PlannedMove {
    PlannedMove {
        source,
        destination,
        category,
        action,
    }
}

fn skip_excluded(record: FileRecord, reason: ExclusionReason) -> FileOutcome {
    FileOutcome::planned(plan(record, None, None, Action::SkipExcluded(reason)), None)
}

/// True when `path` lies where this engine writes: inside the target root when
/// the source lives elsewhere, else inside `target_root/<known category>`.
pub(crate) fn in_destination(
    path: &Path,
    source_dir: &Path,
    target_root: &Path,
    rules: &RuleSet,
) -> bool {
    if !source_dir.starts_with(target_root) && path.starts_with(target_root) {
        return true;
    }
    is_organized_path(path, target_root, rules)
}

/// A directory the walk must not enter: a category folder of the target
/// root, or anything already inside the destination area.
fn is_destination_dir(dir: &Path, source_dir: &Path, target_root: &Path, rules: &RuleSet) -> bool {
    let is_category = dir.parent() == Some(target_root)
        && dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| rules.is_known_category(n));
    is_category || in_destination(dir, source_dir, target_root, rules)
}

/// Organize every file in `source_dir`, streaming outcomes to `sink`.
pub fn organize_batch(
    source_dir: &Path,
    rules: &RuleSet,
    opts: &OrganizeOptions,
    preview: bool,
    sink: &dyn ReportSink,
    cancel: &CancelToken,
) -> Result<BatchResult, TidyMoveError> {
    let started = Instant::now();
    let source_dir =
        std::path::absolute(source_dir).map_err(|e| TidyMoveError::SourceDirUnreadable {
            path: source_dir.to_path_buf(),
            source: e,
        })?;
    fs::read_dir(&source_dir).map_err(|e| TidyMoveError::SourceDirUnreadable {
        path: source_dir.clone(),
        source: e,
    })?;

    let mut opts = opts.clone();
    opts.target_root =
        std::path::absolute(&opts.target_root).map_err(|e| TidyMoveError::DestinationUnwritable {
            path: opts.target_root.clone(),
            source: e,
        })?;
    if !preview {
        fs::create_dir_all(&opts.target_root).map_err(|e| TidyMoveError::DestinationUnwritable {
            path: opts.target_root.clone(),
            source: e,
        })?;
    }
    let target_root = opts.target_root.clone();

    info!(
        source = %source_dir.display(),
        target = %target_root.display(),
        recursive = opts.recursive,
        preview,
        "organize started"
    );

    let claims = PlannedClaims::new();
    let mut result = BatchResult {
        source_dir: source_dir.clone(),
        target_root: target_root.clone(),
        preview,
        moved: 0,
        skipped: 0,
        failed: 0,
        cancelled: false,
        outcomes: Vec::new(),
        elapsed: Duration::ZERO,
    };

    let max_depth = if opts.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&source_dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && is_destination_dir(e.path(), &source_dir, &target_root, rules))
        });

    for entry in walker {
        if cancel.is_cancelled() {
            info!(done = result.outcomes.len(), "organize cancelled");
            result.cancelled = true;
            break;
        }
        let outcome = match entry {
            Ok(entry) => {
                if entry.file_type().is_dir()
                    || in_destination(entry.path(), &source_dir, &target_root, rules)
                {
                    continue;
                }
                let mode = if preview { Mode::Preview(&claims) } else { Mode::Execute };
                match FileRecord::inspect(entry.path()) {
                    Ok(record) => run_pipeline(record, rules, &opts, mode),
                    Err(e) => FileOutcome::failed(entry.path().to_path_buf(), None, e),
                }
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source_dir.clone());
                let msg = e.to_string();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other(msg));
                FileOutcome::failed(
                    path.clone(),
                    None,
                    TidyMoveError::Io {
                        op: "list",
                        path,
                        source,
                    },
                )
            }
        };
        sink.on_file_outcome(&outcome);
        result.record(outcome);
    }

    result.elapsed = started.elapsed();
    info!(
        moved = result.moved,
        skipped = result.skipped,
        failed = result.failed,
        cancelled = result.cancelled,
        elapsed_ms = result.elapsed.as_millis() as u64,
        preview,
        "organize finished"
    );
    sink.on_batch_complete(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullSink;
    use tempfile::tempdir;

    fn rules() -> RuleSet {
        RuleSet::new(
            [("Images", vec!["jpg"]), ("Documents", vec!["txt"])],
            "Other",
        )
        .unwrap()
        .with_excluded_extensions(["tmp"])
    }

    #[test]
    fn one_file_moves_into_category() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let p = src.path().join("a.jpg");
        fs::write(&p, b"img").unwrap();
        let out = organize_path(&p, &rules(), &OrganizeOptions::new(dst.path()), false);
        assert_eq!(out.status(), Status::Moved);
        assert_eq!(out.method, Some(MoveMethod::Renamed));
        assert!(dst.path().join("Images/a.jpg").exists());
        assert!(!p.exists());
    }

    #[test]
    fn preview_touches_nothing() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let p = src.path().join("b.txt");
        fs::write(&p, b"doc").unwrap();
        let out = organize_path(&p, &rules(), &OrganizeOptions::new(dst.path()), true);
        assert_eq!(out.status(), Status::Moved);
        assert_eq!(out.destination(), Some(dst.path().join("Documents/b.txt").as_path()));
        assert!(p.exists());
        assert!(!dst.path().join("Documents").exists());
    }

    #[test]
    fn excluded_extension_is_skipped() {
        let src = tempdir().unwrap();
        let p = src.path().join("x.TMP");
        fs::write(&p, b"t").unwrap();
        let out = organize_path(&p, &rules(), &OrganizeOptions::new(src.path()), false);
        assert_eq!(out.status(), Status::Skipped(SkipReason::Excluded(ExclusionReason::Extension)));
        assert!(p.exists());
    }

    #[test]
    fn vanished_file_is_source_not_found() {
        let src = tempdir().unwrap();
        let opts = OrganizeOptions::new(src.path());
        let out = organize_path(&src.path().join("gone.jpg"), &rules(), &opts, false);
        assert_eq!(out.status(), Status::Failed("source_not_found"));
        assert!(out.planned.is_none());
    }

    #[test]
    fn in_place_batch_skips_category_folders() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("Images")).unwrap();
        fs::write(root.path().join("Images/old.jpg"), b"old").unwrap();
        fs::write(root.path().join("new.jpg"), b"new").unwrap();
        let mut opts = OrganizeOptions::new(root.path());
        opts.recursive = true;
        let res =
            organize_batch(root.path(), &rules(), &opts, false, &NullSink, &CancelToken::new())
                .unwrap();
        assert_eq!(res.moved, 1);
        assert_eq!(res.outcomes.len(), 1);
        assert!(root.path().join("Images/new.jpg").exists());
        assert!(root.path().join("Images/old.jpg").exists());
    }

    #[test]
    fn missing_source_dir_aborts() {
        let td = tempdir().unwrap();
        let err = organize_batch(
            &td.path().join("nope"),
            &rules(),
            &OrganizeOptions::new(td.path()),
            false,
            &NullSink,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TidyMoveError::SourceDirUnreadable { .. }));
    }

    #[test]
    fn cancelled_token_stops_before_first_file() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), b"a").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let opts = OrganizeOptions::new(dst.path());
        let res = organize_batch(src.path(), &rules(), &opts, false, &NullSink, &cancel).unwrap();
        assert!(res.cancelled);
        assert!(res.outcomes.is_empty());
        assert!(src.path().join("a.txt").exists());
    }
}
