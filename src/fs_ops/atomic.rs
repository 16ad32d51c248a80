//! No-clobber rename.
//! - Linux (glibc): renameat2(RENAME_NOREPLACE), one atomic step.
//! - Elsewhere, or when the filesystem rejects the flag: hard link + unlink.
//!   The link fails with AlreadyExists if the name is taken, so an existing
//!   destination is never replaced.
//!
//! Only a refused hard link is reported as `ErrorKind::Unsupported`. Rename
//! errors (EPERM on an immutable file, EACCES) come back untouched.

use std::fs;
use std::io;
use std::path::Path;

use super::util::is_link_unsupported;

/// Move `src` to `dst` only if `dst` does not exist. AlreadyExists means the
/// destination was taken; EXDEV or Unsupported means the caller must copy instead.
pub(super) fn rename_no_clobber(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    {
        match renameat2_noreplace(src, dst) {
            Ok(()) => return Ok(()),
            Err(e) if matches!(e.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS)) => {
                tracing::trace!(error = %e, "RENAME_NOREPLACE unsupported here; linking instead");
            }
            Err(e) => return Err(e),
        }
    }
    link_then_unlink(src, dst)
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn renameat2_noreplace(src: &Path, dst: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let to_c = |p: &Path| {
        CString::new(p.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))
    };
    let s = to_c(src)?;
    let d = to_c(dst)?;
    // SAFETY: both pointers come from live CStrings; AT_FDCWD resolves relative paths.
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            s.as_ptr(),
            libc::AT_FDCWD,
            d.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn link_then_unlink(src: &Path, dst: &Path) -> io::Result<()> {
    fs::hard_link(src, dst).map_err(link_error)?;
    if let Err(e) = fs::remove_file(src) {
        // Undo so the file is not left at two names.
        let _ = fs::remove_file(dst);
        return Err(e);
    }
    Ok(())
}

fn link_error(e: io::Error) -> io::Error {
    if is_link_unsupported(&e) && e.kind() != io::ErrorKind::Unsupported {
        io::Error::new(io::ErrorKind::Unsupported, e)
    } else {
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn moves_when_free() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"data").unwrap();
        rename_no_clobber(&a, &b).unwrap();
        assert!(!a.exists());
        assert_eq!(fs::read(&b).unwrap(), b"data");
    }

    #[test]
    fn refuses_existing_destination() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"new").unwrap();
        fs::write(&b, b"old").unwrap();
        let err = rename_no_clobber(&a, &b).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&b).unwrap(), b"old");
        assert_eq!(fs::read(&a).unwrap(), b"new");
    }

    #[test]
    fn missing_source_is_not_found() {
        let td = tempdir().unwrap();
        let err = rename_no_clobber(&td.path().join("x"), &td.path().join("y")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn refused_link_becomes_unsupported() {
        let e = link_error(io::Error::from_raw_os_error(libc::EPERM));
        assert_eq!(e.kind(), io::ErrorKind::Unsupported);
        let e = link_error(io::Error::from_raw_os_error(libc::EXDEV));
        assert_eq!(e.raw_os_error(), Some(libc::EXDEV));
        let e = link_error(io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
    }
}
