//! Typed error definitions for tidy_move.
//! Every per-file failure maps onto one of these kinds so outcomes can be
//! reported as FAILED(kind) and tests can match on them.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TidyMoveError {
    #[error("Permission denied on {path}: {context}")]
    PermissionDenied { path: PathBuf, context: String },

    #[error("Source path not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Destination not writable {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No free name for '{name}' in {dir} after {attempts} attempts")]
    ResolutionExhausted {
        dir: PathBuf,
        name: String,
        attempts: u32,
    },

    #[error("Copied {src} to {dest} but could not remove the original: {cause}")]
    PartialMove {
        src: PathBuf,
        dest: PathBuf,
        cause: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Cannot read source directory {path}: {source}")]
    SourceDirUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source {path} changed while copying (expected {expected} bytes, copied {copied})")]
    SourceChanged {
        path: PathBuf,
        expected: u64,
        copied: u64,
    },

    #[error("Filesystem watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid watcher state: {0}")]
    InvalidState(&'static str),

    #[error("{op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TidyMoveError {
    /// Stable numeric code for logs and exit statuses.
    pub fn code(&self) -> u16 {
        match self {
            TidyMoveError::PermissionDenied { .. } => 10,
            TidyMoveError::SourceNotFound(_) => 11,
            TidyMoveError::DestinationUnwritable { .. } => 12,
            TidyMoveError::ResolutionExhausted { .. } => 13,
            TidyMoveError::PartialMove { .. } => 14,
            TidyMoveError::ConfigInvalid(_) => 15,
            TidyMoveError::SourceDirUnreadable { .. } => 16,
            TidyMoveError::SourceChanged { .. } => 17,
            TidyMoveError::Watch(_) => 18,
            TidyMoveError::InvalidState(_) => 19,
            TidyMoveError::Io { .. } => 20,
        }
    }

    /// Short machine-friendly name, used as the `kind` field in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TidyMoveError::PermissionDenied { .. } => "permission_denied",
            TidyMoveError::SourceNotFound(_) => "source_not_found",
            TidyMoveError::DestinationUnwritable { .. } => "destination_unwritable",
            TidyMoveError::ResolutionExhausted { .. } => "resolution_exhausted",
            TidyMoveError::PartialMove { .. } => "partial_move",
            TidyMoveError::ConfigInvalid(_) => "config_invalid",
            TidyMoveError::SourceDirUnreadable { .. } => "source_dir_unreadable",
            TidyMoveError::SourceChanged { .. } => "source_changed",
            TidyMoveError::Watch(_) => "watch",
            TidyMoveError::InvalidState(_) => "invalid_state",
            TidyMoveError::Io { .. } => "io",
        }
    }

    /// Map an io::Error raised while touching the *source* file.
    pub(crate) fn from_source_io(op: &'static str, path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => TidyMoveError::SourceNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => TidyMoveError::PermissionDenied {
                path: path.to_path_buf(),
                context: format!("{op}: {e}"),
            },
            _ => TidyMoveError::Io {
                op,
                path: path.to_path_buf(),
                source: e,
            },
        }
    }

    /// Map an io::Error raised while writing at the *destination*.
    pub(crate) fn from_dest_io(op: &'static str, path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => TidyMoveError::PermissionDenied {
                path: path.to_path_buf(),
                context: format!("{op}: {e}"),
            },
            _ => TidyMoveError::DestinationUnwritable {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

pub type Result<T, E = TidyMoveError> = std::result::Result<T, E>;
