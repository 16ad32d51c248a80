//! Snapshot of one file at inspection time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::classify::normalize_extension;
use crate::errors::TidyMoveError;

/// Built fresh every time a file is processed; never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    /// Name without its final extension (".bashrc" keeps its whole name).
    pub stem: String,
    /// Final extension as written on disk, without the dot ("JPG").
    pub raw_extension: Option<String>,
    /// Lowercase with leading dot (".jpg"), or empty.
    pub extension: String,
    pub size: u64,
    pub modified: SystemTime,
    pub is_symlink: bool,
}

impl FileRecord {
    /// Stat `path` without following symlinks. Directories and special files
    /// are refused; a vanished path is `SourceNotFound`.
    pub fn inspect(path: &Path) -> Result<Self, TidyMoveError> {
        let path = std::path::absolute(path)
            .map_err(|e| TidyMoveError::from_source_io("resolve path", path, e))?;
        let meta = fs::symlink_metadata(&path)
            .map_err(|e| TidyMoveError::from_source_io("inspect", &path, e))?;
        let ft = meta.file_type();
        if !ft.is_file() && !ft.is_symlink() {
            return Err(TidyMoveError::Io {
                op: "inspect",
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TidyMoveError::Io {
                op: "inspect",
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            })?;
        let p = Path::new(&name);
        let stem = p
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        // "notes." has an empty extension, which counts as none.
        let raw_extension = p
            .extension()
            .filter(|e| !e.is_empty())
            .map(|e| e.to_string_lossy().into_owned());
        let extension = match &raw_extension {
            Some(e) => format!(".{}", normalize_extension(e)),
            None => String::new(),
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        Ok(Self {
            path,
            name,
            stem,
            raw_extension,
            extension,
            size: meta.len(),
            modified,
            is_symlink: ft.is_symlink(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn splits_name_and_normalizes_extension() {
        let td = tempdir().unwrap();
        let p = td.path().join("Holiday.Photo.JPG");
        fs::write(&p, b"12345").unwrap();
        let r = FileRecord::inspect(&p).unwrap();
        assert_eq!(r.name, "Holiday.Photo.JPG");
        assert_eq!(r.stem, "Holiday.Photo");
        assert_eq!(r.raw_extension.as_deref(), Some("JPG"));
        assert_eq!(r.extension, ".jpg");
        assert_eq!(r.size, 5);
        assert!(!r.is_symlink);
    }

    #[test]
    fn dotfile_has_no_extension() {
        let td = tempdir().unwrap();
        let p = td.path().join(".profile");
        fs::write(&p, b"x").unwrap();
        let r = FileRecord::inspect(&p).unwrap();
        assert_eq!(r.stem, ".profile");
        assert_eq!(r.extension, "");
    }

    #[test]
    fn trailing_dot_has_no_extension() {
        let td = tempdir().unwrap();
        let p = td.path().join("draft.");
        fs::write(&p, b"x").unwrap();
        let r = FileRecord::inspect(&p).unwrap();
        assert_eq!(r.raw_extension, None);
        assert_eq!(r.extension, "");
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let td = tempdir().unwrap();
        let err = FileRecord::inspect(&td.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, TidyMoveError::SourceNotFound(_)));
    }

    #[test]
    fn directory_is_refused() {
        let td = tempdir().unwrap();
        assert!(FileRecord::inspect(td.path()).is_err());
    }
}
