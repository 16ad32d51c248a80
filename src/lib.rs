//! Core library for `tidy_move`.
//!
//! Sorts the files of a directory into category folders by extension:
//! classify, resolve a collision-free destination, move without clobbering.
//! The same per-file pipeline serves one-shot batches, previews and the
//! directory watcher. Rules are passed explicitly; nothing here touches a UI.

pub mod classify;
pub mod cli;
pub mod config;
pub mod digest;
pub mod errors;
pub mod fs_ops;
pub mod organizer;
pub mod output;
pub mod platform;
pub mod record;
pub mod report;
pub mod resolve;
pub mod rules;
pub mod shutdown;
pub mod stats;
pub mod watcher;

pub use classify::{Classification, classify, normalize_extension};
pub use config::{
    CONFIG_ENV, ConfigOrigin, ConfigStore, LoadedConfig, LogLevel, Settings, default_config_path,
    default_log_path, path_has_symlink_ancestor,
};
pub use errors::{Result, TidyMoveError};
pub use organizer::{
    Action, BatchResult, FileOutcome, OrganizeOptions, PlannedMove, SkipReason, Status,
    organize_batch, organize_one, organize_path,
};
pub use record::FileRecord;
pub use report::{FanOut, NullSink, QueuedSink, ReportSink, TracingSink};
pub use resolve::{Resolution, resolve_destination};
pub use rules::{ExclusionReason, RuleSet};
pub use shutdown::CancelToken;
pub use stats::{DirStats, stats};
pub use watcher::{WatchOptions, WatchState, Watcher};
