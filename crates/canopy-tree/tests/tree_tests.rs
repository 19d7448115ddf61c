use std::sync::Arc;
use std::time::Duration;

use canopy_api::{FakeApi, ProjectApi};
use canopy_core::{
    ApiError, ChangeType, DirectoryEntry, EntryKind, IgnoreList, ProjectContext,
};
use canopy_tree::{ChangeDetector, DirectoryCache, TickOutcome, Toggle, TreeLoader};
use chrono::{DateTime, Utc};

struct Harness {
    api: Arc<FakeApi>,
    loader: TreeLoader<FakeApi>,
    detector: ChangeDetector<FakeApi>,
}

fn harness(api: Arc<FakeApi>) -> Harness {
    let cache = Arc::new(DirectoryCache::new());
    let project = Arc::new(ProjectContext::new("demo"));
    let loader = TreeLoader::new(
        Arc::clone(&api),
        Arc::clone(&cache),
        Arc::clone(&project),
        false,
    );
    let detector = ChangeDetector::new(
        Arc::clone(&api),
        cache,
        project,
        IgnoreList::fallback(),
        false,
    );
    Harness {
        api,
        loader,
        detector,
    }
}

fn project_api() -> Arc<FakeApi> {
    let api = Arc::new(FakeApi::new());
    api.add_folder("src");
    api.add_file("src/main.ts", 100);
    api.add_file("package.json", 20);
    api
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[tokio::test]
async fn test_root_listing_makes_no_child_calls() {
    let api = Arc::new(FakeApi::new());
    let entries: Vec<DirectoryEntry> = (0..150)
        .map(|i| {
            if i % 10 == 0 {
                DirectoryEntry::folder(format!("dir{i:03}"), ts(i))
            } else {
                DirectoryEntry::file(format!("file{i:03}.txt"), i as u64, ts(i))
            }
        })
        .collect();
    api.set_listing("", entries);
    let h = harness(api);

    let root = h.loader.load_root().await.unwrap();
    assert_eq!(root.len(), 150);
    assert_eq!(h.api.count("list"), 1);
    assert_eq!(h.loader.visible_rows().len(), 150);
}

#[tokio::test]
async fn test_expand_collapse_expand_hits_cache() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();

    assert_eq!(h.loader.toggle_folder("src").await.unwrap(), Toggle::Expanded);
    assert_eq!(h.loader.toggle_folder("src").await.unwrap(), Toggle::Collapsed);
    assert_eq!(h.loader.toggle_folder("src").await.unwrap(), Toggle::Expanded);
    assert_eq!(h.api.list_calls("src"), 1);
}

#[tokio::test]
async fn test_external_create_is_detected_and_applied() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.loader.toggle_folder("src").await.unwrap();

    h.api.add_file("src/new.ts", 0);
    let outcome = h.detector.poll_once().await;
    assert_eq!(
        outcome,
        TickOutcome::Checked {
            folders: 2,
            changes: 1
        }
    );

    let snapshot = h.detector.snapshot();
    let change = &snapshot.changes()[0];
    assert_eq!(change.path, "src/new.ts");
    assert_eq!(change.kind, EntryKind::File);
    assert_eq!(change.change_type, ChangeType::Added);

    h.detector.apply_update().await.unwrap();
    assert!(!h.detector.has_changes());
    let src = h.loader.cache().entries("src").unwrap();
    assert!(src.iter().any(|e| e.name == "new.ts"));
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.loader.toggle_folder("src").await.unwrap();

    for _ in 0..2 {
        h.detector.apply_update().await.unwrap();
        let snapshot = h.detector.snapshot();
        assert!(!snapshot.has_changes());
        assert!(snapshot.changes().is_empty());
    }
}

#[tokio::test]
async fn test_repeated_ticks_keep_one_record_per_path() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();

    h.api.add_file("notes.md", 1);
    h.detector.poll_once().await;
    h.api.touch("notes.md");
    h.detector.poll_once().await;

    let snapshot = h.detector.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.changes()[0].change_type, ChangeType::Added);
}

#[tokio::test]
async fn test_modified_entry_is_reported() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.api.touch("package.json");

    h.detector.poll_once().await;
    let snapshot = h.detector.snapshot();
    assert_eq!(snapshot.changes()[0].path, "package.json");
    assert_eq!(snapshot.changes()[0].change_type, ChangeType::Modified);
}

#[tokio::test]
async fn test_unlistable_folder_reports_entries_removed() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.loader.toggle_folder("src").await.unwrap();

    h.api.fail_list("src", ApiError::status(500, "io error"));
    h.detector.poll_once().await;

    let snapshot = h.detector.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.changes()[0].path, "src/main.ts");
    assert_eq!(snapshot.changes()[0].change_type, ChangeType::Removed);
}

#[tokio::test]
async fn test_ignored_paths_are_dropped() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.detector
        .set_ignore_list(IgnoreList::new(vec!["node_modules".to_string()]));

    h.api.add_folder("node_modules");
    h.api.add_file("keep.txt", 1);
    h.detector.poll_once().await;

    let paths: Vec<_> = h
        .detector
        .snapshot()
        .changes()
        .iter()
        .map(|c| c.path.clone())
        .collect();
    assert_eq!(paths, ["keep.txt"]);
}

#[tokio::test]
async fn test_failed_update_applies_nothing() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.loader.toggle_folder("src").await.unwrap();

    h.api.add_file("src/new.ts", 0);
    h.api.add_file("root.txt", 0);
    h.detector.poll_once().await;
    assert_eq!(h.detector.snapshot().len(), 2);

    h.api.fail_list("src", ApiError::status(500, "io error"));
    assert!(h.detector.apply_update().await.is_err());

    assert_eq!(h.detector.snapshot().len(), 2);
    let root = h.loader.cache().entries("").unwrap();
    assert!(!root.iter().any(|e| e.name == "root.txt"));
}

#[tokio::test]
async fn test_update_drops_vanished_folder() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.loader.toggle_folder("src").await.unwrap();

    h.api.delete("demo", "src").await.unwrap();
    let outcome = h.detector.apply_update().await.unwrap();
    assert_eq!(outcome.dropped, 1);
    assert!(!h.loader.cache().is_expanded("src"));
    assert!(!h.loader.cache().is_cached("src"));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_never_overlap() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.api.set_latency(Duration::from_millis(100));

    let (first, second) = tokio::join!(h.detector.poll_once(), h.detector.poll_once());
    assert!(matches!(first, TickOutcome::Checked { .. }));
    assert_eq!(second, TickOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn test_update_waits_for_running_tick() {
    let h = harness(project_api());
    h.loader.load_root().await.unwrap();
    h.api.add_file("late.txt", 1);
    h.api.set_latency(Duration::from_millis(100));

    let (tick, update) = tokio::join!(h.detector.poll_once(), h.detector.apply_update());
    assert!(matches!(tick, TickOutcome::Checked { changes: 1, .. }));
    update.unwrap();
    assert!(!h.detector.has_changes());
}
