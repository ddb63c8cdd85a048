use std::fs;
use std::path::Path;
use std::time::Duration;

use agent_spy::{DiffEngine, FileEvent, Operation, Watcher, WatcherConfig, WatcherHandle};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEBOUNCE_MS: u64 = 100;

struct Running {
    handle: WatcherHandle,
    events: mpsc::Receiver<FileEvent>,
    task: JoinHandle<()>,
}

fn start_watcher(root: &Path, filters: &[&str]) -> Running {
    let config = WatcherConfig {
        debounce_ms: DEBOUNCE_MS,
        filters: filters.iter().map(|f| f.to_string()).collect(),
        ..WatcherConfig::default()
    };
    let (tx, events) = mpsc::channel(config.queue_capacity);
    let watcher = Watcher::new(root, tx, &config).expect("Failed to create watcher");
    let handle = watcher.handle();

    Running {
        handle,
        events,
        task: watcher.start(),
    }
}

/// Receive events until the queue has been quiet for `quiet`.
async fn collect_events(events: &mut mpsc::Receiver<FileEvent>, quiet: Duration) -> Vec<FileEvent> {
    let mut collected = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(quiet, events.recv()).await {
        collected.push(event);
    }
    collected
}

fn events_for<'a>(events: &'a [FileEvent], path: &str) -> Vec<&'a FileEvent> {
    events.iter().filter(|ev| ev.path == path).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_file_yields_single_create() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start_watcher(temp_dir.path(), &[]);

    fs::write(temp_dir.path().join("main.txt"), "line one\nline two\n").expect("Failed to write file");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;
    let main = events_for(&events, "main.txt");

    assert_eq!(main.len(), 1, "events: {:?}", events);
    assert_eq!(main[0].op, Operation::Create);

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_filtered_directory_never_emits() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start_watcher(temp_dir.path(), &[]);

    let pkg = temp_dir.path().join("node_modules/pkg");
    fs::create_dir_all(&pkg).expect("Failed to create node_modules");
    fs::write(pkg.join("index.js"), "module.exports = {};\n").expect("Failed to write file");
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(pkg.join("index.js"), "module.exports = { a: 1 };\n").expect("Failed to rewrite file");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;
    assert!(events.is_empty(), "unexpected events: {:?}", events);

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_extra_patterns_are_filtered() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start_watcher(temp_dir.path(), &["*.log"]);

    fs::write(temp_dir.path().join("debug.log"), "noise\n").expect("Failed to write log");
    fs::write(temp_dir.path().join("Cargo.lock"), "noise\n").expect("Failed to write lock");
    fs::write(temp_dir.path().join("kept.rs"), "fn main() {}\n").expect("Failed to write file");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;
    let paths: Vec<&str> = events.iter().map(|ev| ev.path.as_str()).collect();

    assert_eq!(paths, vec!["kept.rs"]);

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rapid_writes_are_coalesced() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = temp_dir.path().join("burst.txt");
    fs::write(&file, "v0\n").expect("Failed to write file");

    let mut running = start_watcher(temp_dir.path(), &[]);

    for i in 1..=5 {
        fs::write(&file, format!("v{}\n", i)).expect("Failed to rewrite file");
    }

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;
    let burst = events_for(&events, "burst.txt");

    assert_eq!(burst.len(), 1, "events: {:?}", events);
    assert_eq!(burst[0].op, Operation::Modify);

    #[cfg(target_os = "linux")]
    {
        assert!(burst[0].is_debounced());
        assert!(burst[0].change_count() >= 5, "change count {}", burst[0].change_count());
    }

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_then_delete_reports_create() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start_watcher(temp_dir.path(), &[]);
    let engine = DiffEngine::without_baseline(temp_dir.path());

    let file = temp_dir.path().join("fleeting.txt");
    fs::write(&file, "here for a moment\n").expect("Failed to write file");
    fs::remove_file(&file).expect("Failed to delete file");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;
    let fleeting = events_for(&events, "fleeting.txt");

    assert_eq!(fleeting.len(), 1, "events: {:?}", events);
    assert_eq!(fleeting[0].op, Operation::Create);

    let diff = engine.diff("fleeting.txt");
    assert!(!diff.available);
    assert_eq!(diff.error(), Some("file not readable"));

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_directory_is_watched() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start_watcher(temp_dir.path(), &[]);

    fs::create_dir(temp_dir.path().join("src")).expect("Failed to create dir");
    tokio::time::sleep(Duration::from_millis(300)).await;
    fs::write(temp_dir.path().join("src/lib.rs"), "pub fn hello() {}\n").expect("Failed to write file");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;

    assert!(events_for(&events, "src").is_empty(), "directory creation was reported");
    let lib = events_for(&events, "src/lib.rs");
    assert_eq!(lib.len(), 1, "events: {:?}", events);
    assert_eq!(lib[0].op, Operation::Create);

    running.handle.close();
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rename_reports_both_sides() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("old.txt"), "content\n").expect("Failed to write file");
    let mut running = start_watcher(temp_dir.path(), &[]);

    fs::rename(temp_dir.path().join("old.txt"), temp_dir.path().join("new.txt"))
        .expect("Failed to rename");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;

    let old = events_for(&events, "old.txt");
    let new = events_for(&events, "new.txt");
    assert_eq!(old.len(), 1, "events: {:?}", events);
    assert_eq!(old[0].op, Operation::Rename);
    assert_eq!(old[0].change_count(), 1, "sub events: {:?}", old[0].sub_events);
    assert!(!old[0].is_debounced());
    assert_eq!(new.len(), 1, "events: {:?}", events);
    assert_eq!(new[0].op, Operation::Create);
    assert_eq!(new[0].change_count(), 1, "sub events: {:?}", new[0].sub_events);

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_directory_is_not_reported() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let gone = temp_dir.path().join("gone");
    fs::create_dir(&gone).expect("Failed to create dir");
    let mut running = start_watcher(temp_dir.path(), &[]);

    fs::remove_dir(&gone).expect("Failed to remove dir");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;
    assert!(events.is_empty(), "unexpected events: {:?}", events);

    running.handle.close();
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_renamed_directory_reports_files_under_new_name() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir(temp_dir.path().join("sub")).expect("Failed to create dir");
    fs::write(temp_dir.path().join("sub/file.txt"), "v1\n").expect("Failed to write file");
    let mut running = start_watcher(temp_dir.path(), &[]);

    fs::rename(temp_dir.path().join("sub"), temp_dir.path().join("moved"))
        .expect("Failed to rename dir");
    tokio::time::sleep(Duration::from_millis(300)).await;
    fs::write(temp_dir.path().join("moved/file.txt"), "v2\n").expect("Failed to rewrite file");

    let events = collect_events(&mut running.events, Duration::from_secs(1)).await;

    assert!(events_for(&events, "sub").is_empty(), "events: {:?}", events);
    assert!(events_for(&events, "moved").is_empty(), "events: {:?}", events);
    assert!(events_for(&events, "sub/file.txt").is_empty(), "events: {:?}", events);
    let moved = events_for(&events, "moved/file.txt");
    assert_eq!(moved.len(), 1, "events: {:?}", events);
    assert_eq!(moved[0].op, Operation::Modify);

    running.handle.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_stops_watcher_and_drains_queue() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut running = start_watcher(temp_dir.path(), &[]);

    running.handle.close();
    tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .expect("watcher did not stop")
        .expect("watcher task panicked");

    fs::write(temp_dir.path().join("late.txt"), "after close\n").expect("Failed to write file");

    let closed = tokio::time::timeout(Duration::from_secs(2), running.events.recv())
        .await
        .expect("queue did not close");
    assert!(closed.is_none());
}
