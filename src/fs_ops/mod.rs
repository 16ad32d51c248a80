//! Filesystem operations used to relocate one file.
//!
//! `move_no_clobber` never replaces an existing destination. It tries a
//! no-clobber rename first and degrades to copy + publish + delete when the
//! rename cannot cross filesystems. Errors come back as typed `TidyMoveError`s,
//! except a destination that appeared under us, which the caller retries.

mod atomic;
mod copy;
mod helpers;
mod meta;
mod util;

pub use helpers::{io_error_with_help, io_error_with_help_io};

use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::TidyMoveError;
use crate::platform::tmp_sibling_name;
use copy::CopyError;

/// How a successful move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Renamed,
    Copied,
}

impl MoveMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveMethod::Renamed => "rename",
            MoveMethod::Copied => "copy",
        }
    }
}

#[derive(Debug)]
pub enum MoveFailure {
    /// Someone else created the destination after it was planned.
    DestinationTaken,
    Error(TidyMoveError),
}

impl From<TidyMoveError> for MoveFailure {
    fn from(e: TidyMoveError) -> Self {
        MoveFailure::Error(e)
    }
}

/// Create `dir` and its parents; existing directories are fine, including
/// ones a concurrent worker just made.
pub fn ensure_dir(dir: &Path) -> Result<(), TidyMoveError> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(_) if dir.is_dir() => Ok(()),
        Err(e) => Err(TidyMoveError::from_dest_io(
            "create directory",
            dir,
            io_error_with_help_io("create directory", dir)(e),
        )),
    }
}

/// Move `src` to the free path `dst` without ever overwriting.
pub fn move_no_clobber(
    src: &Path,
    dst: &Path,
    preserve_timestamps: bool,
) -> Result<MoveMethod, MoveFailure> {
    match atomic::rename_no_clobber(src, dst) {
        Ok(()) => {
            sync_parent(dst);
            return Ok(MoveMethod::Renamed);
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(MoveFailure::DestinationTaken);
        }
        Err(e) if needs_copy(&e) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %e,
                "rename not possible; copying"
            );
        }
        Err(e) => return Err(rename_error(src, dst, e).into()),
    }

    copy_into_place(src, dst, preserve_timestamps)?;
    retire_source(src, dst)?;
    sync_parent(dst);
    Ok(MoveMethod::Copied)
}

/// Delete the original once its copy is published. If the original is
/// already gone, another mover won: withdraw our copy so the file exists once.
fn retire_source(src: &Path, dst: &Path) -> Result<(), MoveFailure> {
    match fs::remove_file(src) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let _ = fs::remove_file(dst);
            debug!(src = %src.display(), dest = %dst.display(), "source taken by another mover");
            Err(TidyMoveError::SourceNotFound(src.to_path_buf()).into())
        }
        Err(cause) => {
            warn!(
                src = %src.display(),
                dest = %dst.display(),
                error = %cause,
                "copied but original remains"
            );
            Err(TidyMoveError::PartialMove {
                src: src.to_path_buf(),
                dest: dst.to_path_buf(),
                cause,
            }
            .into())
        }
    }
}

/// Only a cross-device rename or a filesystem without hard links falls back
/// to copying. Permission errors from the rename itself do not.
fn needs_copy(e: &io::Error) -> bool {
    util::is_cross_device(e) || e.kind() == io::ErrorKind::Unsupported
}

/// Copy into a hidden sibling of `dst`, then publish it under `dst` with the
/// same no-clobber rename. A half-written file never carries the final name.
fn copy_into_place(src: &Path, dst: &Path, preserve_timestamps: bool) -> Result<(), MoveFailure> {
    let tmp = tmp_sibling_name(dst, "part");
    let src_meta = copy::copy_no_clobber(src, &tmp).map_err(|e| copy_failure(src, dst, e))?;
    if preserve_timestamps {
        keep_times(&src_meta, &tmp);
    }

    let Err(e) = atomic::rename_no_clobber(&tmp, dst) else {
        return Ok(());
    };
    let _ = fs::remove_file(&tmp);
    match e.kind() {
        io::ErrorKind::AlreadyExists => Err(MoveFailure::DestinationTaken),
        io::ErrorKind::Unsupported => {
            debug!(dest = %dst.display(), "no atomic publish on this filesystem; copying in place");
            let src_meta =
                copy::copy_no_clobber(src, dst).map_err(|e| copy_failure(src, dst, e))?;
            if preserve_timestamps {
                keep_times(&src_meta, dst);
            }
            Ok(())
        }
        _ => {
            let e = io_error_with_help_io("publish copy", dst)(e);
            Err(TidyMoveError::from_dest_io("publish copy", dst, e).into())
        }
    }
}

fn keep_times(src_meta: &fs::Metadata, path: &Path) {
    if let Err(e) = meta::preserve_times(src_meta, path) {
        warn!(dest = %path.display(), error = %e, "could not carry timestamps over");
    }
}

fn copy_failure(src: &Path, dst: &Path, e: CopyError) -> MoveFailure {
    match e {
        CopyError::Dest(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            MoveFailure::DestinationTaken
        }
        CopyError::Dest(e) => {
            let e = io_error_with_help_io("copy into", dst)(e);
            TidyMoveError::from_dest_io("copy", dst, e).into()
        }
        CopyError::Source(e) => TidyMoveError::from_source_io("copy", src, e).into(),
        CopyError::Changed { expected, copied } => TidyMoveError::SourceChanged {
            path: src.to_path_buf(),
            expected,
            copied,
        }
        .into(),
    }
}

fn sync_parent(dst: &Path) {
    if let Some(parent) = dst.parent() {
        let _ = util::fsync_dir(parent);
    }
}

/// A rename error is about the source when the source is gone (or unreadable);
/// otherwise it is about the destination.
fn rename_error(src: &Path, dst: &Path, e: io::Error) -> TidyMoveError {
    match fs::symlink_metadata(src) {
        Err(se) if se.kind() == io::ErrorKind::NotFound => {
            TidyMoveError::SourceNotFound(src.to_path_buf())
        }
        _ if e.kind() == io::ErrorKind::PermissionDenied => TidyMoveError::PermissionDenied {
            path: src.to_path_buf(),
            context: helpers::build_message("move", dst, &e),
        },
        _ if e.kind() == io::ErrorKind::NotFound => {
            TidyMoveError::from_dest_io("move", dst, io_error_with_help_io("move into", dst)(e))
        }
        _ => TidyMoveError::Io {
            op: "move",
            path: src.to_path_buf(),
            source: io_error_with_help_io("move", dst)(e),
        },
    }
}
