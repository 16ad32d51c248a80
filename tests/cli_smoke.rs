//! End-to-end runs of the binary. Each test passes --config pointing into its
//! own temp dir so the user's real config is never read or created.

use assert_cmd::assert::OutputAssertExt; // bring .assert() into scope
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Canonical temp dir: on macOS the temp root sits behind a /var symlink,
/// which the config writer refuses.
fn base(td: &tempfile::TempDir) -> std::path::PathBuf {
    fs::canonicalize(td.path()).unwrap()
}

fn tidy(cfg: &Path) -> Command {
    let me = assert_cmd::cargo::cargo_bin!("tidy_move");
    let mut cmd = Command::new(me);
    cmd.arg("--config").arg(cfg).env_remove("TIDY_MOVE_CONFIG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).unwrap()
}

#[test]
fn organize_moves_files_into_category_folders() {
    let td = tempdir().unwrap();
    let cfg = base(&td).join("config.xml");
    let src = base(&td).join("in");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.jpg"), "img").unwrap();
    fs::write(src.join("b.txt"), "doc").unwrap();

    let out = stdout_of(tidy(&cfg).arg("organize").arg(&src));
    assert!(out.contains("MOVED"), "stdout: {out}");
    assert!(src.join("Images/a.jpg").is_file());
    assert!(src.join("Documents/b.txt").is_file());
}

#[test]
fn dry_run_and_preview_leave_files_alone() {
    let td = tempdir().unwrap();
    let cfg = base(&td).join("config.xml");
    let src = base(&td).join("in");
    let target = base(&td).join("out");
    fs::create_dir_all(&src).unwrap();
    for n in ["a.txt", "b.txt", "c.txt"] {
        fs::write(src.join(n), n).unwrap();
    }

    let mut cmd = tidy(&cfg);
    cmd.arg("organize").arg(&src).arg("--target").arg(&target).arg("--dry-run");
    let out = stdout_of(&mut cmd);
    assert!(out.contains("would move"), "stdout: {out}");

    let out = stdout_of(tidy(&cfg).args(["preview", "--limit", "1"]).arg(&src));
    assert_eq!(out.lines().filter(|l| l.starts_with("MOVED")).count(), 1, "stdout: {out}");
    assert!(out.contains("2 more not shown"), "stdout: {out}");

    assert!(!target.exists());
    assert!(src.join("a.txt").is_file());
    assert!(!src.join("Documents").exists());
}

#[test]
fn failed_file_gives_nonzero_exit() {
    let td = tempdir().unwrap();
    let cfg = base(&td).join("config.xml");
    let src = base(&td).join("in");
    let target = base(&td).join("out");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("Documents"), "not a folder").unwrap();
    fs::write(src.join("b.txt"), "doc").unwrap();
    fs::write(src.join("a.png"), "img").unwrap();

    tidy(&cfg)
        .arg("organize")
        .arg(&src)
        .arg("--target")
        .arg(&target)
        .assert()
        .failure();
    assert!(target.join("Images/a.png").is_file());
    assert!(src.join("b.txt").is_file());
}

#[test]
fn config_set_get_and_add_rule_persist() {
    let td = tempdir().unwrap();
    let cfg = base(&td).join("nested").join("config.xml");

    assert_eq!(stdout_of(tidy(&cfg).args(["config", "path"])).trim(), cfg.display().to_string());
    tidy(&cfg).args(["config", "set", "default_category", "Misc"]).assert().success();
    tidy(&cfg).args(["config", "add-rule", "Ebooks", "epub,mobi"]).assert().success();
    assert_eq!(stdout_of(tidy(&cfg).args(["config", "get", "default_category"])).trim(), "Misc");
    assert_eq!(
        stdout_of(tidy(&cfg).args(["config", "get", "categories.Ebooks"])).trim(),
        ".epub,.mobi"
    );

    // Rejected edits leave the file unchanged.
    tidy(&cfg).args(["config", "set", "date_format", "../%Y"]).assert().failure();
    tidy(&cfg).args(["config", "add-rule", "Books", "epub"]).assert().failure();
    tidy(&cfg).args(["config", "get", "nope"]).assert().failure();

    let list = stdout_of(tidy(&cfg).args(["config", "list"]));
    assert!(list.contains("categories.Ebooks = .epub,.mobi"));
    assert!(list.contains("date_format = %Y-%m"));
    assert!(!list.contains("categories.Books"));
}

#[test]
fn malformed_config_warns_but_still_runs() {
    let td = tempdir().unwrap();
    let cfg = base(&td).join("config.xml");
    fs::write(&cfg, "<config><categories>").unwrap();
    let src = base(&td).join("in");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("x.pdf"), "pdf").unwrap();

    let out = tidy(&cfg).arg("organize").arg(&src).assert().success().get_output().clone();
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("Invalid configuration"), "stderr: {stderr}");
    assert!(src.join("Documents/x.pdf").is_file());

    // Editing refuses to overwrite the broken file with defaults.
    tidy(&cfg).args(["config", "set", "organize_by_date", "true"]).assert().failure();
    assert_eq!(fs::read_to_string(&cfg).unwrap(), "<config><categories>");
}

#[test]
fn stats_reports_counts() {
    let td = tempdir().unwrap();
    let cfg = base(&td).join("config.xml");
    let dir = base(&td).join("d");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.mp3"), "12").unwrap();
    fs::write(dir.join("b.mp3"), "34").unwrap();
    fs::write(dir.join("c.zip"), "5").unwrap();

    let out = stdout_of(tidy(&cfg).arg("stats").arg(&dir));
    assert!(out.starts_with("3 files, 5 bytes"), "stdout: {out}");
    assert!(out.contains("Audio"));
    assert!(dir.join("a.mp3").is_file());
}
