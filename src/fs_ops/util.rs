use std::fs::File;
use std::io;
use std::path::Path;

/// EXDEV / ERROR_NOT_SAME_DEVICE. std has no stable ErrorKind for it.
pub(super) fn is_cross_device(e: &io::Error) -> bool {
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EXDEV,
        #[cfg(windows)]
        Some(code) => code == 17,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}

/// The filesystem (or policy) refuses hard links: degrade to copy.
pub(super) fn is_link_unsupported(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => {
            code == libc::EPERM
                || code == libc::EOPNOTSUPP
                || code == libc::ENOTSUP
                || code == libc::EMLINK
        }
        // ERROR_INVALID_FUNCTION / ERROR_NOT_SUPPORTED (FAT, network shares)
        #[cfg(windows)]
        Some(code) => code == 1 || code == 50,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}

#[cfg(unix)]
pub(super) fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
pub(super) fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
