//! Timestamp preservation for the copy fallback (renames keep them anyway).

use filetime::{FileTime, set_file_times};
use std::fs::Metadata;
use std::io;
use std::path::Path;

/// Apply the source's atime/mtime to `dest`.
pub(super) fn preserve_times(src_meta: &Metadata, dest: &Path) -> io::Result<()> {
    let mtime = FileTime::from_last_modification_time(src_meta);
    let atime = FileTime::from_last_access_time(src_meta);
    set_file_times(dest, atime, mtime)
}
