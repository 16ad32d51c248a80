//! Copy fallback for moves across filesystems.
//!
//! - The destination is created with `create_new`, so an existing file is never clobbered.
//! - 1 MiB buffered streaming, then `sync_all`.
//! - The byte count is checked against the source length taken when the copy
//!   started; a mismatch means the source changed underneath us.
//! - Any failure removes the partial destination.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

const BUF_SIZE: usize = 1024 * 1024;

/// Which side of the copy failed.
#[derive(Debug)]
pub(super) enum CopyError {
    Source(io::Error),
    Dest(io::Error),
    Changed { expected: u64, copied: u64 },
}

/// Copy `src` into a new file at `dst`. Returns the source metadata captured
/// before copying (for timestamp preservation).
pub(super) fn copy_no_clobber(src: &Path, dst: &Path) -> Result<fs::Metadata, CopyError> {
    let input = File::open(src).map_err(CopyError::Source)?;
    let meta = input.metadata().map_err(CopyError::Source)?;
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)
        .map_err(CopyError::Dest)?;

    match stream(input, output) {
        Ok(copied) if copied == meta.len() => Ok(meta),
        Ok(copied) => {
            let _ = fs::remove_file(dst);
            Err(CopyError::Changed {
                expected: meta.len(),
                copied,
            })
        }
        Err(e) => {
            let _ = fs::remove_file(dst);
            Err(e)
        }
    }
}

fn stream(input: File, output: File) -> Result<u64, CopyError> {
    let mut reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, output);
    let copied = io::copy(&mut reader, &mut writer).map_err(|e| match e.kind() {
        // io::copy does not say which side failed; writes are the usual culprit
        io::ErrorKind::NotFound => CopyError::Source(e),
        _ => CopyError::Dest(e),
    })?;
    writer.flush().map_err(CopyError::Dest)?;
    let file = writer
        .into_inner()
        .map_err(|e| CopyError::Dest(e.into_error()))?;
    file.sync_all().map_err(CopyError::Dest)?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_bytes_and_keeps_source() {
        let td = tempdir().unwrap();
        let a = td.path().join("a.bin");
        let b = td.path().join("b.bin");
        let body = vec![7u8; 3 * BUF_SIZE + 11];
        fs::write(&a, &body).unwrap();
        let meta = copy_no_clobber(&a, &b).unwrap();
        assert_eq!(meta.len(), body.len() as u64);
        assert_eq!(fs::read(&b).unwrap(), body);
        assert!(a.exists());
    }

    #[test]
    fn existing_destination_is_untouched() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"new").unwrap();
        fs::write(&b, b"old").unwrap();
        let err = copy_no_clobber(&a, &b).unwrap_err();
        assert!(matches!(err, CopyError::Dest(ref e) if e.kind() == io::ErrorKind::AlreadyExists));
        assert_eq!(fs::read(&b).unwrap(), b"old");
    }

    #[test]
    fn missing_source_reports_source_side() {
        let td = tempdir().unwrap();
        let err = copy_no_clobber(&td.path().join("nope"), &td.path().join("b")).unwrap_err();
        assert!(matches!(err, CopyError::Source(_)));
        assert!(!td.path().join("b").exists());
    }
}
