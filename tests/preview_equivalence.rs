//! A preview must plan exactly what a real run then does, and touch nothing.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use walkdir::WalkDir;

use tidy_move::{CancelToken, NullSink, OrganizeOptions, RuleSet, Status, organize_batch};

/// Every entry under `root` with its size (0 for directories).
fn snapshot(root: &Path) -> Vec<(PathBuf, u64)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| {
            let e = e.unwrap();
            let len = if e.file_type().is_file() { e.metadata().unwrap().len() } else { 0 };
            (e.path().to_path_buf(), len)
        })
        .collect()
}

fn setup() -> (tempfile::TempDir, tempfile::TempDir) {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    fs::create_dir_all(dst.path().join("Images")).unwrap();
    fs::write(dst.path().join("Images/a.jpg"), "already there").unwrap();
    fs::write(src.path().join("a.jpg"), "top level").unwrap();
    fs::create_dir_all(src.path().join("sub")).unwrap();
    fs::write(src.path().join("sub/a.jpg"), "nested copy").unwrap();
    fs::write(src.path().join("dup.jpg"), "already there").unwrap();
    fs::write(dst.path().join("Images/dup.jpg"), "already there").unwrap();
    fs::write(src.path().join("notes.txt"), "n").unwrap();
    fs::write(src.path().join("junk.tmp"), "t").unwrap();
    (src, dst)
}

#[test]
fn preview_matches_real_run_and_changes_nothing() {
    let (src, dst) = setup();
    let rules = RuleSet::new([("Images", vec!["jpg"]), ("Documents", vec!["txt"])], "Other")
        .unwrap()
        .with_excluded_extensions(["tmp"]);
    let mut opts = OrganizeOptions::new(dst.path());
    opts.recursive = true;

    let before = (snapshot(src.path()), snapshot(dst.path()));
    let preview =
        organize_batch(src.path(), &rules, &opts, true, &NullSink, &CancelToken::new()).unwrap();
    assert_eq!(before, (snapshot(src.path()), snapshot(dst.path())));
    assert!(preview.preview);

    let real =
        organize_batch(src.path(), &rules, &opts, false, &NullSink, &CancelToken::new()).unwrap();
    let plan = |r: &tidy_move::BatchResult| -> Vec<(PathBuf, Status, Option<PathBuf>)> {
        r.outcomes
            .iter()
            .map(|o| (o.source.clone(), o.status(), o.destination().map(Path::to_path_buf)))
            .collect()
    };
    assert_eq!(plan(&preview), plan(&real));
    assert_eq!((real.moved, real.skipped, real.failed), (3, 2, 0));

    // Both jpgs collide with the existing a.jpg and with each other.
    assert_eq!(fs::read_to_string(dst.path().join("Images/a_1.jpg")).unwrap(), "top level");
    assert_eq!(fs::read_to_string(dst.path().join("Images/a_2.jpg")).unwrap(), "nested copy");
}

#[test]
fn preview_of_missing_target_does_not_create_it() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a.txt"), "x").unwrap();
    let target = src.path().join("sorted");
    let rules = RuleSet::new([("Documents", vec!["txt"])], "Other").unwrap();

    let opts = OrganizeOptions::new(&target);
    let res =
        organize_batch(src.path(), &rules, &opts, true, &NullSink, &CancelToken::new()).unwrap();
    assert_eq!(res.moved, 1);
    assert_eq!(res.outcomes[0].destination(), Some(target.join("Documents/a.txt").as_path()));
    assert!(!target.exists());
    assert!(src.path().join("a.txt").is_file());
}
