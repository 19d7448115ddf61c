use canopy_core::{
    ChangeRecord, ChangeType, DirectoryEntry, EntryKind, Fingerprint, IgnoreList, Release,
    SlideConfirm, SyncConfig,
};
use chrono::{DateTime, Utc};

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn sample_entries() -> Vec<DirectoryEntry> {
    vec![
        DirectoryEntry::folder("src", ts(10)),
        DirectoryEntry::file("README.md", 120, ts(20)),
        DirectoryEntry::file("Cargo.toml", 512, ts(30)),
        DirectoryEntry::folder("tests", ts(40)),
    ]
}

/// Heap's algorithm, enough for the four-entry sample.
fn permutations(items: Vec<DirectoryEntry>) -> Vec<Vec<DirectoryEntry>> {
    fn generate(k: usize, items: &mut Vec<DirectoryEntry>, out: &mut Vec<Vec<DirectoryEntry>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        generate(k - 1, items, out);
        for i in 0..k - 1 {
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
            generate(k - 1, items, out);
        }
    }

    let mut items = items;
    let mut out = Vec::new();
    let len = items.len();
    generate(len, &mut items, &mut out);
    out
}

#[test]
fn test_fingerprint_is_order_independent() {
    let baseline = Fingerprint::of(&sample_entries());
    let perms = permutations(sample_entries());
    assert_eq!(perms.len(), 24);

    for perm in perms {
        assert_eq!(Fingerprint::of(&perm), baseline);
    }
}

#[test]
fn test_fingerprint_changes_with_membership() {
    let mut entries = sample_entries();
    let before = Fingerprint::of(&entries);
    entries.push(DirectoryEntry::file("new.ts", 0, ts(50)));
    assert_ne!(Fingerprint::of(&entries), before);
}

#[test]
fn test_empty_listing_has_stable_fingerprint() {
    assert_eq!(Fingerprint::of(&[]), Fingerprint::of(&[]));
}

#[test]
fn test_change_record_from_entry() {
    let entry = DirectoryEntry::file("src/new.ts", 0, ts(1));
    let record = ChangeRecord::added(&entry);
    assert_eq!(record.path, "src/new.ts");
    assert_eq!(record.name, "new.ts");
    assert_eq!(record.kind, EntryKind::File);
    assert_eq!(record.change_type, ChangeType::Added);
    assert_eq!(record.change_type.to_string(), "added");
}

#[test]
fn test_change_record_wire_names() {
    let entry = DirectoryEntry::folder("lib", ts(1));
    let json = serde_json::to_value(ChangeRecord::removed(&entry)).unwrap();
    assert_eq!(json["changeType"], "removed");
    assert_eq!(json["type"], "folder");
}

#[test]
fn test_ignore_list_from_config() {
    let config = SyncConfig::builder()
        .ignored_dirs(vec!["vendor".to_string()])
        .build()
        .unwrap();
    let ignore: IgnoreList = config.ignore_list();
    assert!(ignore.matches("vendor/lib.js"));
    assert!(!ignore.matches("node_modules"));
}

#[test]
fn test_slide_confirm_threshold_from_config() {
    let config = SyncConfig::default();
    let mut confirm = SlideConfirm::new(config.confirm_threshold);
    confirm.arm("ALL");
    confirm.drag(config.confirm_threshold - 1);
    assert_eq!(confirm.release(), Release::SnappedBack);
    confirm.drag(config.confirm_threshold);
    assert_eq!(confirm.release(), Release::Fire("ALL"));
}
