//! Read-only aggregate view of a directory: totals by category and extension.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::classify::{Classification, classify};
use crate::errors::TidyMoveError;
use crate::record::FileRecord;
use crate::rules::RuleSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    pub count: u64,
    pub size: u64,
}

impl Bucket {
    fn add(&mut self, size: u64) {
        self.count += 1;
        self.size += size;
    }

    fn merge(&mut self, other: Bucket) {
        self.count += other.count;
        self.size += other.size;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirStats {
    pub total_files: u64,
    pub total_size: u64,
    pub by_category: BTreeMap<String, Bucket>,
    /// Keyed by normalized extension with dot; "" for none.
    pub by_extension: BTreeMap<String, Bucket>,
    /// Files whose extension is excluded (they still count towards totals).
    pub excluded: u64,
}

impl DirStats {
    fn add(&mut self, rec: &FileRecord, rules: &RuleSet) {
        self.total_files += 1;
        self.total_size += rec.size;
        self.by_extension
            .entry(rec.extension.clone())
            .or_default()
            .add(rec.size);
        match classify(&rec.extension, rules) {
            Classification::Excluded => self.excluded += 1,
            Classification::Category(name) => {
                self.by_category.entry(name).or_default().add(rec.size)
            }
        }
    }

    fn merge(mut self, other: DirStats) -> DirStats {
        self.total_files += other.total_files;
        self.total_size += other.total_size;
        self.excluded += other.excluded;
        for (k, v) in other.by_category {
            self.by_category.entry(k).or_default().merge(v);
        }
        for (k, v) in other.by_extension {
            self.by_extension.entry(k).or_default().merge(v);
        }
        self
    }

    /// Extensions by descending count, ties by name.
    pub fn top_extensions(&self, n: usize) -> Vec<(&str, Bucket)> {
        let mut v: Vec<_> = self
            .by_extension
            .iter()
            .map(|(k, b)| (k.as_str(), *b))
            .collect();
        v.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(b.0)));
        v.truncate(n);
        v
    }
}

/// Count the regular files in `dir` (hidden names skipped). Nothing is moved.
pub fn stats(dir: &Path, rules: &RuleSet, recursive: bool) -> Result<DirStats, TidyMoveError> {
    fs::read_dir(dir).map_err(|e| TidyMoveError::SourceDirUnreadable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let max_depth = if recursive { usize::MAX } else { 1 };
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            !(name.starts_with('.') || name.starts_with('~'))
        })
        .map(|e| e.into_path())
        .collect();

    let out = files
        .par_iter()
        .filter_map(|p| FileRecord::inspect(p).ok())
        .fold(DirStats::default, |mut acc, rec| {
            acc.add(&rec, rules);
            acc
        })
        .reduce(DirStats::default, DirStats::merge);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counts_by_category_and_extension() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a.jpg"), b"12").unwrap();
        fs::write(td.path().join("b.JPG"), b"345").unwrap();
        fs::write(td.path().join("c.txt"), b"6").unwrap();
        fs::write(td.path().join("d.tmp"), b"").unwrap();
        fs::write(td.path().join(".hidden"), b"zz").unwrap();
        fs::create_dir_all(td.path().join("sub")).unwrap();
        fs::write(td.path().join("sub/e.txt"), b"7").unwrap();

        let rules = RuleSet::new([("Images", vec!["jpg"])], "Other")
            .unwrap()
            .with_excluded_extensions(["tmp"]);
        let s = stats(td.path(), &rules, false).unwrap();
        assert_eq!(s.total_files, 4);
        assert_eq!(s.total_size, 6);
        assert_eq!(s.by_category["Images"], Bucket { count: 2, size: 5 });
        assert_eq!(s.by_category["Other"].count, 1);
        assert_eq!(s.by_extension[".jpg"].count, 2);
        assert_eq!(s.excluded, 1);
        assert_eq!(s.top_extensions(1)[0].0, ".jpg");

        let deep = stats(td.path(), &rules, true).unwrap();
        assert_eq!(deep.total_files, 5);
        // Read-only.
        assert!(td.path().join("a.jpg").exists());
    }

    #[test]
    fn unreadable_dir_is_an_error() {
        let td = tempdir().unwrap();
        let rules = RuleSet::new(Vec::<(&str, Vec<&str>)>::new(), "Other").unwrap();
        assert!(stats(&td.path().join("missing"), &rules, false).is_err());
    }
}
