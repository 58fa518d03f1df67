use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use watchtrail::{EventKind, FileMonitor, MonitorEvent};

const WAIT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(300);

/// Polls `condition` until it holds or the bounded wait elapses.
fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn events_for(monitor: &FileMonitor, filename: &str) -> Vec<MonitorEvent> {
    monitor
        .events()
        .snapshot()
        .into_iter()
        .filter(|event| event.filename == filename)
        .collect()
}

fn count_kind(monitor: &FileMonitor, filename: &str, kind: EventKind) -> usize {
    events_for(monitor, filename)
        .iter()
        .filter(|event| event.kind == kind)
        .count()
}

fn watched_root(monitor: &FileMonitor, temp: &TempDir) -> PathBuf {
    monitor.add_root(temp.path()).expect("add_root failed");
    temp.path().canonicalize().expect("canonicalize failed")
}

/// Appends to an existing file without the create/truncate that
/// `fs::write` implies, so exactly one modification is reported.
fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new().append(true).open(path).expect("open failed");
    file.write_all(data.as_bytes()).expect("write failed");
}

#[test]
fn test_created_file_yields_exactly_one_created_event() {
    let temp = TempDir::new().unwrap();
    let monitor = FileMonitor::new().unwrap();
    watched_root(&monitor, &temp);
    monitor.start();

    File::create(temp.path().join("hello.txt")).unwrap();

    assert!(
        wait_until(|| count_kind(&monitor, "hello.txt", EventKind::Created) >= 1),
        "no CREATED event for hello.txt"
    );
    std::thread::sleep(SETTLE);
    assert_eq!(count_kind(&monitor, "hello.txt", EventKind::Created), 1);

    monitor.stop();
}

#[test]
fn test_new_directory_becomes_watched() {
    let temp = TempDir::new().unwrap();
    let monitor = FileMonitor::new().unwrap();
    let root = watched_root(&monitor, &temp);
    monitor.start();

    let before = monitor.watched_dirs();
    fs::create_dir(temp.path().join("fresh")).unwrap();
    assert!(
        wait_until(|| monitor.watched_dirs() > before),
        "new directory was not registered"
    );

    // No explicit add_root for `fresh`; its contents must be observable.
    File::create(temp.path().join("fresh/inner.txt")).unwrap();
    assert!(
        wait_until(|| count_kind(&monitor, "inner.txt", EventKind::Created) >= 1),
        "no CREATED event from inside the new directory"
    );

    let event = events_for(&monitor, "inner.txt").remove(0);
    assert_eq!(event.directory, root.join("fresh"));

    monitor.stop();
}

#[test]
fn test_extension_filter_records_only_matching_files() {
    let temp = TempDir::new().unwrap();
    let monitor = FileMonitor::new().unwrap();
    watched_root(&monitor, &temp);
    monitor.set_extension_filter(".txt");
    monitor.start();

    File::create(temp.path().join("x.txt")).unwrap();
    File::create(temp.path().join("y.md")).unwrap();

    assert!(
        wait_until(|| count_kind(&monitor, "x.txt", EventKind::Created) >= 1),
        "no CREATED event for x.txt"
    );
    std::thread::sleep(SETTLE);

    let all = monitor.events().snapshot();
    assert_eq!(all.len(), 1, "filter should drop y.md entirely: {all:?}");
    assert_eq!(all[0].filename, "x.txt");
    assert_eq!(all[0].extension, ".txt");

    monitor.stop();
}

#[test]
fn test_stop_then_start_resumes_delivery() {
    let temp = TempDir::new().unwrap();
    let monitor = FileMonitor::new().unwrap();
    watched_root(&monitor, &temp);

    monitor.start();
    File::create(temp.path().join("first.log")).unwrap();
    assert!(wait_until(|| count_kind(&monitor, "first.log", EventKind::Created) >= 1));

    monitor.stop();
    assert!(!monitor.is_running());

    monitor.start();
    assert!(monitor.is_running());
    File::create(temp.path().join("second.log")).unwrap();
    assert!(
        wait_until(|| count_kind(&monitor, "second.log", EventKind::Created) >= 1),
        "no events after restart"
    );

    monitor.stop();
}

#[test]
fn test_double_start_does_not_duplicate_events() {
    let temp = TempDir::new().unwrap();
    let monitor = FileMonitor::new().unwrap();
    watched_root(&monitor, &temp);

    monitor.start();
    monitor.start();

    File::create(temp.path().join("once.txt")).unwrap();
    assert!(wait_until(|| count_kind(&monitor, "once.txt", EventKind::Created) >= 1));
    std::thread::sleep(SETTLE);
    assert_eq!(
        count_kind(&monitor, "once.txt", EventKind::Created),
        1,
        "a second start must not spawn a second loop"
    );

    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());
}

#[test]
fn test_lifecycle_of_one_file_is_ordered() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("sub")).unwrap();

    let monitor = FileMonitor::new().unwrap();
    let root = watched_root(&monitor, &temp);
    monitor.start();

    let log = temp.path().join("a.log");
    File::create(&log).unwrap();
    assert!(wait_until(|| count_kind(&monitor, "a.log", EventKind::Created) >= 1));

    append(&log, "one line\n");
    assert!(wait_until(|| count_kind(&monitor, "a.log", EventKind::Modified) >= 1));

    fs::remove_file(&log).unwrap();
    assert!(wait_until(|| count_kind(&monitor, "a.log", EventKind::Deleted) >= 1));

    File::create(temp.path().join("sub/b.log")).unwrap();
    assert!(wait_until(|| count_kind(&monitor, "b.log", EventKind::Created) >= 1));

    monitor.stop();

    let log_events: Vec<MonitorEvent> = monitor
        .events()
        .snapshot()
        .into_iter()
        .filter(|event| event.extension == ".log")
        .collect();

    // The OS may coalesce or repeat notifications; collapse consecutive
    // repeats before asserting the order.
    let mut sequence: Vec<(String, EventKind)> = Vec::new();
    for event in &log_events {
        let step = (event.filename.clone(), event.kind);
        if sequence.last() != Some(&step) {
            sequence.push(step);
        }
    }
    assert_eq!(
        sequence,
        vec![
            ("a.log".to_string(), EventKind::Created),
            ("a.log".to_string(), EventKind::Modified),
            ("a.log".to_string(), EventKind::Deleted),
            ("b.log".to_string(), EventKind::Created),
        ],
        "unexpected event order: {log_events:?}"
    );

    for event in &log_events {
        assert_eq!(event.extension, ".log");
        let expected = if event.filename == "b.log" {
            root.join("sub")
        } else {
            root.clone()
        };
        assert_eq!(event.directory, expected);
    }
}

#[test]
fn test_subscription_sees_events_in_order() {
    let temp = TempDir::new().unwrap();
    let monitor = FileMonitor::new().unwrap();
    watched_root(&monitor, &temp);
    let rx = monitor.events().subscribe();
    monitor.start();

    File::create(temp.path().join("sub.txt")).unwrap();

    let event = rx.recv_timeout(WAIT).expect("subscriber got no event");
    assert_eq!(event.filename, "sub.txt");
    assert_eq!(event.kind, EventKind::Created);

    monitor.stop();
}

#[test]
fn test_deleting_every_watched_directory_stops_the_loop() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("only");
    fs::create_dir(&root).unwrap();

    let monitor = FileMonitor::new().unwrap();
    monitor.add_root(&root).unwrap();
    monitor.start();

    fs::remove_dir(&root).unwrap();

    assert!(
        wait_until(|| !monitor.is_running()),
        "loop should exit once the watch set empties"
    );
    assert_eq!(monitor.watched_dirs(), 0);

    // stop() on the self-stopped monitor stays a no-op.
    monitor.stop();
    assert!(!monitor.is_running());
}
