//! Destination planning: category folder, optional date subfolder, and a
//! collision-free file name.
//!
//! Policy:
//! - Free candidate: use it.
//! - Occupied by a regular file with identical bytes (size, then SHA-256): duplicate, no move.
//! - Otherwise: `{stem}_{n}{.ext}` for n = 1..=max_suffix, checking existence each step.
//!
//! The existence checks here are advisory; the no-clobber move in `fs_ops` is
//! what actually prevents an overwrite when another actor races us.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

use crate::digest::same_content;
use crate::errors::TidyMoveError;
use crate::organizer::OrganizeOptions;
use crate::record::FileRecord;
use crate::rules::RuleSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Free destination path.
    Target(PathBuf),
    /// An identical file already sits at this path.
    Duplicate(PathBuf),
}

/// Destinations planned earlier in the same preview, keyed by destination and
/// holding the planning source. A preview treats them as occupied so it
/// predicts the names a sequential real run would pick.
#[derive(Debug, Default)]
pub struct PlannedClaims {
    inner: Mutex<HashMap<PathBuf, (PathBuf, u64)>>,
}

impl PlannedClaims {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, dest: &Path) -> Option<(PathBuf, u64)> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(dest)
            .cloned()
    }

    fn claim(&self, dest: PathBuf, source: &FileRecord) {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(dest, (source.path.clone(), source.size));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What currently holds a candidate path.
enum Occupant {
    File { path: PathBuf, len: u64 },
    Other,
}

fn occupant(candidate: &Path, claims: Option<&PlannedClaims>) -> io::Result<Option<Occupant>> {
    if let Some((src, len)) = claims.and_then(|c| c.get(candidate)) {
        return Ok(Some(Occupant::File { path: src, len }));
    }
    match fs::symlink_metadata(candidate) {
        Ok(meta) if meta.file_type().is_file() => Ok(Some(Occupant::File {
            path: candidate.to_path_buf(),
            len: meta.len(),
        })),
        Ok(_) => Ok(Some(Occupant::Other)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// `target_root/category[/date]`.
pub fn category_dir(
    record: &FileRecord,
    category: &str,
    opts: &OrganizeOptions,
) -> Result<PathBuf, TidyMoveError> {
    let mut dir = opts.target_root.join(category);
    if opts.organize_by_date {
        let local: DateTime<Local> = record.modified.into();
        let mut sub = String::new();
        write!(sub, "{}", local.format(&opts.date_format)).map_err(|_| {
            TidyMoveError::ConfigInvalid(format!("bad date format '{}'", opts.date_format))
        })?;
        let sub = PathBuf::from(sub);
        let relative = sub.components().all(|c| matches!(c, Component::Normal(_)));
        if sub.as_os_str().is_empty() || !relative {
            return Err(TidyMoveError::ConfigInvalid(format!(
                "date format '{}' does not yield a relative folder",
                opts.date_format
            )));
        }
        dir.push(sub);
    }
    Ok(dir)
}

/// Plan the destination for `record` in `category`. When `claims` is given
/// (preview), the chosen path is recorded there.
pub fn resolve_destination(
    record: &FileRecord,
    category: &str,
    opts: &OrganizeOptions,
    claims: Option<&PlannedClaims>,
) -> Result<Resolution, TidyMoveError> {
    let dir = category_dir(record, category, opts)?;
    let file_name = record
        .path
        .file_name()
        .unwrap_or_else(|| OsStr::new(&record.name));
    let base = Path::new(file_name);
    let stem: OsString = base
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| file_name.to_os_string());
    let ext = base.extension();

    let candidate = dir.join(build_name_with_suffix(&stem, ext, ""));
    let found = occupant(&candidate, claims)
        .map_err(|e| TidyMoveError::from_dest_io("inspect destination", &candidate, e))?;
    match found {
        None => return Ok(finish(candidate, record, claims)),
        Some(Occupant::File { path, len }) => {
            if path == record.path {
                return Ok(Resolution::Duplicate(candidate));
            }
            let identical = same_content(&record.path, record.size, &path, len)
                .map_err(|e| TidyMoveError::from_source_io("compare content", &record.path, e))?;
            if identical {
                trace!(
                    src = %record.path.display(),
                    existing = %candidate.display(),
                    "identical file already present"
                );
                return Ok(Resolution::Duplicate(candidate));
            }
        }
        Some(Occupant::Other) => {}
    }

    for n in 1..=opts.max_suffix {
        let name = build_name_with_suffix(&stem, ext, &format!("_{n}"));
        let path = dir.join(name);
        let free = occupant(&path, claims)
            .map_err(|e| TidyMoveError::from_dest_io("inspect destination", &path, e))?
            .is_none();
        if free {
            return Ok(finish(path, record, claims));
        }
        if n == 3 {
            trace!(
                name = %record.name,
                dir = %dir.display(),
                "several collisions; still searching for a free suffix"
            );
        }
    }
    Err(TidyMoveError::ResolutionExhausted {
        dir,
        name: record.name.clone(),
        attempts: opts.max_suffix,
    })
}

fn finish(path: PathBuf, record: &FileRecord, claims: Option<&PlannedClaims>) -> Resolution {
    if let Some(c) = claims {
        c.claim(path.clone(), record);
    }
    Resolution::Target(path)
}

/// True for paths inside `target_root/<known category>/…`: files this engine
/// already placed and must not pick up again.
pub fn is_organized_path(path: &Path, target_root: &Path, rules: &RuleSet) -> bool {
    let Ok(rel) = path.strip_prefix(target_root) else {
        return false;
    };
    let mut comps = rel.components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(first)), Some(_)) => first
            .to_str()
            .is_some_and(|name| rules.is_known_category(name)),
        _ => false,
    }
}

#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// `stem + suffix + [.ext]`, shortening the stem so the whole name fits the
/// platform file-name limit. Extension case is kept as given.
pub(crate) fn build_name_with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut overhead = suffix.len();
    if let Some(e) = ext {
        overhead += 1 + name_len_units(e);
    }

    let mut stem_os = stem.to_os_string();
    if name_len_units(stem) + overhead > MAX_FILENAME_LEN {
        let budget = MAX_FILENAME_LEN.saturating_sub(overhead).max(1);
        let lossy = stem.to_string_lossy();
        let mut acc = String::new();
        for ch in lossy.chars() {
            if acc.len() + ch.len_utf8() > budget {
                break;
            }
            acc.push(ch);
        }
        if acc.is_empty() {
            acc.push('f');
        }
        stem_os = OsString::from(acc);
    }

    let mut out = stem_os;
    out.push(suffix);
    if let Some(e) = ext {
        out.push(".");
        out.push(e);
    }
    out
}
