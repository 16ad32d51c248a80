//! I/O helper utilities.
//!
//! Adapters that enrich io::Error with the operation, the path and a
//! platform hint, for use with map_err.
//!
//!   // anyhow::Result code
//!   fs::write(dest, text).map_err(io_error_with_help("write export", dest))?;
//!
//!   // io::Result code (keeps the ErrorKind)
//!   File::open(p).map_err(io_error_with_help_io("open source", p))?;

use anyhow::anyhow;
use std::io;
use std::path::Path;

fn hint_for(e: &io::Error) -> Option<&'static str> {
    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            libc::EACCES | libc::EPERM => "check ownership and write permissions",
            libc::EXDEV => "different filesystem; rename not possible",
            libc::EBUSY => "resource busy; another process may be using it",
            libc::ENOSPC => "no space left on device",
            libc::EROFS => "read-only filesystem",
            libc::ENAMETOOLONG => "file name or path too long",
            libc::ELOOP => "too many levels of symbolic links",
            libc::EMFILE | libc::ENFILE => "too many open files",
            _ => return None,
        };
        return Some(hint);
    }
    #[cfg(windows)]
    if let Some(code) = e.raw_os_error() {
        let hint = match code {
            5 => "access denied; check permissions",
            17 => "different drive; rename not possible",
            32 => "sharing violation; file is in use",
            112 => "insufficient disk space",
            206 => "file name or path too long",
            _ => return None,
        };
        return Some(hint);
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("check ownership and write permissions"),
        io::ErrorKind::AlreadyExists => Some("name already taken"),
        _ => None,
    }
}

/// "op 'path': error (hint) [os code: n]"
pub(crate) fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{} '{}': {}", op, path.display(), e);
    if let Some(h) = hint_for(e) {
        msg.push_str(" (");
        msg.push_str(h);
        msg.push(')');
    }
    if let Some(code) = e.raw_os_error() {
        msg.push_str(&format!(" [os code: {code}]"));
    }
    msg
}

/// For anyhow::Result code paths.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e: io::Error| anyhow!(build_message(op, path, &e))
}

/// For io::Result code paths; the ErrorKind is preserved.
pub fn io_error_with_help_io<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}
