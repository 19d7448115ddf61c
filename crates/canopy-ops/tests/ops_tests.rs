use std::sync::Arc;

use canopy_api::FakeApi;
use canopy_core::{ApiError, EntryKind, ProjectContext};
use canopy_ops::{CrudError, CrudOp, CrudOrchestrator, DeleteRelease, Rejection, Selection};
use canopy_tree::{DirectoryCache, TreeLoader};

struct Harness {
    api: Arc<FakeApi>,
    loader: Arc<TreeLoader<FakeApi>>,
    crud: CrudOrchestrator<FakeApi>,
}

async fn harness(api: FakeApi) -> Harness {
    let api = Arc::new(api);
    let project = Arc::new(ProjectContext::new("demo"));
    let loader = Arc::new(TreeLoader::new(
        Arc::clone(&api),
        Arc::new(DirectoryCache::new()),
        Arc::clone(&project),
        false,
    ));
    loader.load_root().await.unwrap();
    let crud = CrudOrchestrator::new(
        Arc::clone(&api),
        project,
        Arc::clone(&loader),
        Arc::new(Selection::new()),
        80,
    );
    Harness { api, loader, crud }
}

fn names(loader: &TreeLoader<FakeApi>, path: &str) -> Vec<String> {
    loader
        .cache()
        .entries(path)
        .unwrap()
        .iter()
        .map(|e| e.name.to_string())
        .collect()
}

#[tokio::test]
async fn test_rename_collision_shows_collision_message() {
    let api = FakeApi::new();
    api.add_file("old.ts", 1);
    api.add_file("new.ts", 1);
    let h = harness(api).await;

    let err = h.crud.rename("old.ts", "new.ts").await.unwrap_err();
    assert!(matches!(
        &err,
        CrudError::Rejected {
            op: CrudOp::Rename,
            reason: Rejection::NameCollision,
            ..
        }
    ));
    assert_eq!(err.to_string(), "A file or folder with that name already exists");
    assert_eq!(names(&h.loader, ""), ["new.ts", "old.ts"]);
}

#[tokio::test]
async fn test_failed_rename_leaves_tree_and_selection_alone() {
    let api = FakeApi::new();
    api.add_folder("lib");
    api.add_file("lib/mod.rs", 1);
    api.add_file("a.txt", 1);
    let h = harness(api).await;
    h.loader.toggle_folder("lib").await.unwrap();
    h.crud.selection().select("lib/mod.rs");
    let root = h.loader.cache().entries("").unwrap();
    let lib = h.loader.cache().entries("lib").unwrap();
    h.api.reset_calls();

    let failures = [
        (500, "Internal error", Rejection::ServerFailure(CrudOp::Rename)),
        (403, "Access to sensitive file denied", Rejection::Protected),
        (500, "ENOSPC: no space left on device", Rejection::DiskFull),
        (500, "EACCES: permission denied", Rejection::PermissionDenied),
    ];
    for (status, message, expected) in failures {
        h.api.fail("rename", ApiError::status(status, message));
        let err = h.crud.rename("lib/mod.rs", "main.rs").await.unwrap_err();
        let CrudError::Rejected { reason, .. } = &err else {
            panic!("expected a rejection, got {err:?}");
        };
        assert_eq!(reason, &expected);
    }

    assert_eq!(h.loader.cache().entries("").unwrap(), root);
    assert_eq!(h.loader.cache().entries("lib").unwrap(), lib);
    assert!(h.loader.cache().is_expanded("lib"));
    assert_eq!(h.crud.selection().get().as_deref(), Some("lib/mod.rs"));
    assert_eq!(h.api.list_calls(""), 0);
    assert_eq!(h.api.list_calls("lib"), 0);
    assert_eq!(h.api.count("rename"), 4);
}

#[tokio::test]
async fn test_rename_refreshes_only_parent() {
    let api = FakeApi::new();
    api.add_folder("src");
    api.add_folder("docs");
    api.add_file("src/a.rs", 1);
    let h = harness(api).await;
    h.loader.toggle_folder("src").await.unwrap();
    h.loader.toggle_folder("docs").await.unwrap();
    h.api.reset_calls();

    let renamed = h.crud.rename("src/a.rs", "b.rs").await.unwrap();
    assert_eq!(renamed.to, "src/b.rs");
    assert_eq!(names(&h.loader, "src"), ["b.rs"]);
    assert_eq!(h.api.list_calls("src"), 1);
    assert_eq!(h.api.list_calls(""), 0);
    assert_eq!(h.api.list_calls("docs"), 0);
}

#[tokio::test]
async fn test_rename_of_expanded_folder_keeps_it_open() {
    let api = FakeApi::new();
    api.add_folder("lib");
    api.add_file("lib/mod.rs", 1);
    let h = harness(api).await;
    h.loader.toggle_folder("lib").await.unwrap();

    h.crud.rename("lib", "core").await.unwrap();
    let cache = h.loader.cache();
    assert!(!cache.is_cached("lib"));
    assert!(!cache.is_expanded("lib"));
    assert!(cache.is_expanded("core"));
    assert_eq!(names(&h.loader, "core"), ["mod.rs"]);
}

#[tokio::test]
async fn test_create_file_expands_parent_and_selects() {
    let api = FakeApi::new();
    api.add_folder("src");
    let h = harness(api).await;
    assert!(!h.loader.cache().is_expanded("src"));

    let created = h.crud.create("src", "new.ts", EntryKind::File).await.unwrap();
    assert_eq!(created.path, "src/new.ts");
    assert!(created.selected);
    assert!(h.loader.cache().is_expanded("src"));
    assert_eq!(names(&h.loader, "src"), ["new.ts"]);
    assert_eq!(h.crud.selection().get().as_deref(), Some("src/new.ts"));
    assert_eq!(h.api.list_calls("src"), 1);
}

#[tokio::test]
async fn test_create_folder_is_not_selected() {
    let h = harness(FakeApi::new()).await;
    h.crud.selection().select("elsewhere.txt");

    let created = h.crud.create("", "assets", EntryKind::Folder).await.unwrap();
    assert!(!created.selected);
    assert_eq!(names(&h.loader, ""), ["assets"]);
    assert_eq!(h.crud.selection().get().as_deref(), Some("elsewhere.txt"));
}

#[tokio::test]
async fn test_create_in_missing_folder_is_not_found() {
    let h = harness(FakeApi::new()).await;
    let err = h
        .crud
        .create("ghost", "a.txt", EntryKind::File)
        .await
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&Rejection::NotFound));
}

#[tokio::test]
async fn test_delete_expanded_folder_drops_it() {
    let api = FakeApi::new();
    api.add_folder("build");
    api.add_file("build/out.o", 10);
    api.add_file("main.c", 1);
    let h = harness(api).await;
    h.loader.toggle_folder("build").await.unwrap();
    h.crud.selection().select("build/out.o");

    h.crud.arm_delete("build");
    h.crud.drag_delete(80);
    assert_eq!(
        h.crud.release_delete().await.unwrap(),
        DeleteRelease::Deleted("build".into())
    );
    assert_eq!(h.api.count("delete"), 1);
    assert!(!h.loader.cache().is_cached("build"));
    assert!(h.loader.cache().expanded_paths().is_empty());
    assert_eq!(names(&h.loader, ""), ["main.c"]);
    assert!(h.crud.selection().get().is_none());

    assert_eq!(h.crud.release_delete().await.unwrap(), DeleteRelease::Idle);
    assert_eq!(h.api.count("delete"), 1);
}
