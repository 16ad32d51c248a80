use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

use tidy_move::report::{QueuedSink, ReportEvent};
use tidy_move::{
    CancelToken, NullSink, OrganizeOptions, RuleSet, Status, WatchOptions, WatchState, Watcher,
    organize_batch,
};

fn rules() -> RuleSet {
    RuleSet::new([("Documents", vec!["txt"]), ("Images", vec!["png"])], "Other").unwrap()
}

fn fast() -> WatchOptions {
    WatchOptions {
        settle_delay: Duration::from_millis(100),
        recursive: false,
        drain_timeout: Duration::from_secs(5),
    }
}

fn wait_for(path: &std::path::Path) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.is_file() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    false
}

#[test]
fn new_file_is_organized_after_settling() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let (sink, rx) = QueuedSink::bounded(32);
    let mut watcher = Watcher::new();
    watcher
        .start(src.path(), rules(), OrganizeOptions::new(dst.path()), fast(), Arc::new(sink))
        .unwrap();

    fs::write(src.path().join("report.txt"), "quarterly").unwrap();
    assert!(wait_for(&dst.path().join("Documents/report.txt")));
    assert!(!src.path().join("report.txt").exists());

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        ReportEvent::File(rec) => assert_eq!(rec.status, Status::Moved),
        other => panic!("unexpected event {other:?}"),
    }

    watcher.stop().unwrap();
    assert_eq!(watcher.state(), WatchState::Stopped);
}

#[test]
fn in_place_watch_ignores_its_own_output_and_directories() {
    let src = tempdir().unwrap();
    let (sink, rx) = QueuedSink::bounded(32);
    let mut watcher = Watcher::new();
    let mut watch = fast();
    watch.recursive = true;
    watcher
        .start(src.path(), rules(), OrganizeOptions::new(src.path()), watch, Arc::new(sink))
        .unwrap();

    fs::create_dir(src.path().join("incoming")).unwrap();
    fs::write(src.path().join("pic.png"), "px").unwrap();
    assert!(wait_for(&src.path().join("Images/pic.png")));

    // Give the watcher time to see the rename into Images/ and (not) react.
    std::thread::sleep(Duration::from_millis(500));
    watcher.stop().unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 1, "{events:?}");
    assert!(src.path().join("incoming").is_dir());
    assert!(src.path().join("Images/pic.png").is_file());
}

#[test]
fn stop_drains_a_pending_file() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let mut watcher = Watcher::new();
    let mut watch = fast();
    watch.settle_delay = Duration::from_millis(300);
    watcher
        .start(src.path(), rules(), OrganizeOptions::new(dst.path()), watch, Arc::new(NullSink))
        .unwrap();

    fs::write(src.path().join("late.txt"), "l").unwrap();
    // Let the create event reach the worker, then stop before the delay elapses.
    std::thread::sleep(Duration::from_millis(100));
    watcher.stop().unwrap();
    assert!(dst.path().join("Documents/late.txt").is_file());
}

#[test]
fn watcher_and_manual_batch_share_a_directory() {
    let src = tempdir().unwrap();
    let dst = tempdir().unwrap();
    let rules = rules();
    let opts = OrganizeOptions::new(dst.path());
    let mut watcher = Watcher::new();
    watcher
        .start(src.path(), rules.clone(), opts.clone(), fast(), Arc::new(NullSink))
        .unwrap();

    const N: usize = 40;
    for i in 0..N {
        fs::write(src.path().join(format!("n{i:02}.txt")), format!("note {i}")).unwrap();
    }
    // Start the batch while the watcher's first events are settling.
    std::thread::sleep(Duration::from_millis(100));
    let batch = organize_batch(
        src.path(),
        &rules,
        &opts,
        false,
        &NullSink,
        &CancelToken::new(),
    )
    .unwrap();
    for o in &batch.outcomes {
        if let Status::Failed(kind) = o.status() {
            assert_eq!(kind, "source_not_found", "{:?}", o.error);
        }
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while fs::read_dir(src.path()).unwrap().count() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(25));
    }
    watcher.stop().unwrap();

    assert_eq!(fs::read_dir(src.path()).unwrap().count(), 0);
    let docs = dst.path().join("Documents");
    assert_eq!(fs::read_dir(&docs).unwrap().count(), N);
    for i in 0..N {
        let body = fs::read_to_string(docs.join(format!("n{i:02}.txt"))).unwrap();
        assert_eq!(body, format!("note {i}"));
    }
}
