/*!
 * Tests for attrsnap functionality
 */

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::tempdir;

use crate::attrs::{apply, capture, ApplyOutcome, Field, RestoreOptions, SkipReason};
use crate::pattern::RuleSet;
use crate::platform::{AttributeAccessor, FsAccessor};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::types::{AttrRecord, EntryKind, WalkEntry};
use crate::walker::{WalkOptions, Walker};

fn rules(lines: &[&str]) -> RuleSet {
    RuleSet::compile(lines.iter().copied(), false).unwrap()
}

fn excluded(set: &RuleSet, path: &str, is_dir: bool) -> bool {
    set.is_excluded(Path::new(path), is_dir)
}

// Helper function to create a test directory structure
fn setup_test_directory() -> io::Result<tempfile::TempDir> {
    let temp_dir = tempdir()?;

    fs::create_dir(temp_dir.path().join("src"))?;
    fs::create_dir(temp_dir.path().join("build"))?;

    let mut main_file = File::create(temp_dir.path().join("src").join("main.txt"))?;
    writeln!(main_file, "main content")?;

    let mut out_file = File::create(temp_dir.path().join("build").join("out.txt"))?;
    writeln!(out_file, "build output")?;

    let mut log_a = File::create(temp_dir.path().join("a.log"))?;
    writeln!(log_a, "log a")?;

    let mut log_keep = File::create(temp_dir.path().join("keep.log"))?;
    writeln!(log_keep, "log keep")?;

    File::create(temp_dir.path().join("b.txt"))?;

    Ok(temp_dir)
}

fn walk_rel_paths(root: &Path, set: RuleSet, options: WalkOptions) -> Vec<PathBuf> {
    let walker = Walker::new(root, set, options);
    walker
        .walk(|_, _| {})
        .map(|entry| entry.unwrap().rel_path)
        .collect()
}

fn file_entry(path: PathBuf, rel: &str) -> WalkEntry {
    WalkEntry {
        path,
        rel_path: PathBuf::from(rel),
        kind: EntryKind::File,
    }
}

// Pattern matcher

#[test]
fn test_negation_precedence() {
    let set = rules(&["*.log", "!keep.log"]);
    assert!(excluded(&set, "a.log", false));
    assert!(!excluded(&set, "keep.log", false));
    assert!(excluded(&set, "sub/dir/a.log", false));
    assert!(!excluded(&set, "sub/dir/keep.log", false));
}

#[test]
fn test_last_match_wins() {
    let set = rules(&["!keep.log", "*.log"]);
    // The later exclusion overrides the earlier negation.
    assert!(excluded(&set, "keep.log", false));
}

#[test]
fn test_matching_is_deterministic() {
    let set = rules(&["*.tmp", "build/", "!important.tmp"]);
    for path in ["x.tmp", "important.tmp", "build", "src/x.tmp"] {
        let first = excluded(&set, path, false);
        for _ in 0..10 {
            assert_eq!(excluded(&set, path, false), first);
        }
    }
}

#[test]
fn test_basename_match_at_any_depth() {
    let set = rules(&["target"]);
    assert!(excluded(&set, "target", true));
    assert!(excluded(&set, "a/b/target", true));
    assert!(excluded(&set, "a/target", false));
    // Whole segment match, not substring containment.
    assert!(!excluded(&set, "retargeted", false));
    assert!(!excluded(&set, "a/targets", false));
}

#[test]
fn test_anchored_patterns() {
    let set = rules(&["/build"]);
    assert!(excluded(&set, "build", true));
    assert!(!excluded(&set, "sub/build", true));

    // An interior slash anchors too.
    let set = rules(&["doc/frotz"]);
    assert!(excluded(&set, "doc/frotz", true));
    assert!(!excluded(&set, "a/doc/frotz", true));
}

#[test]
fn test_directory_only_patterns() {
    let set = rules(&["build/"]);
    assert!(excluded(&set, "build", true));
    // A file with the same name is not matched.
    assert!(!excluded(&set, "build", false));
    // Everything under the excluded directory is excluded.
    assert!(excluded(&set, "build/out.txt", false));
    assert!(excluded(&set, "build/deep/nested.txt", false));
}

#[test]
fn test_excluded_directory_is_final() {
    // A negation cannot re-include content of an excluded directory.
    let set = rules(&["build/", "!build/keep.txt", "!keep.txt"]);
    assert!(excluded(&set, "build/keep.txt", false));
    // Outside the pruned directory the negation still works.
    assert!(!excluded(&set, "keep.txt", false));
}

#[test]
fn test_single_segment_wildcards() {
    let set = rules(&["src*txt"]);
    // `*` does not cross a path separator.
    assert!(!excluded(&set, "src/main.txt", false));
    assert!(excluded(&set, "srcmaintxt", false));

    let set = rules(&["?.log"]);
    assert!(excluded(&set, "a.log", false));
    assert!(!excluded(&set, "ab.log", false));
}

#[test]
fn test_double_star_crosses_segments() {
    let set = rules(&["build/**"]);
    assert!(excluded(&set, "build/out.txt", false));
    assert!(excluded(&set, "build/a/b/c.txt", false));
    assert!(!excluded(&set, "build", true));
}

#[test]
fn test_character_classes() {
    let set = rules(&["file[0-9].txt"]);
    assert!(excluded(&set, "file1.txt", false));
    assert!(!excluded(&set, "filex.txt", false));
}

#[test]
fn test_case_insensitive_exclusions() {
    let sensitive = RuleSet::compile(["Secret*"], false).unwrap();
    assert!(sensitive.is_excluded(Path::new("Secret.txt"), false));
    assert!(!sensitive.is_excluded(Path::new("secret.txt"), false));

    let insensitive = RuleSet::compile(["Secret*"], true).unwrap();
    assert!(insensitive.is_excluded(Path::new("Secret.txt"), false));
    assert!(insensitive.is_excluded(Path::new("secret.txt"), false));
}

#[test]
fn test_comments_and_blanks_are_skipped() {
    let set = RuleSet::compile(["# a comment", "", "   ", "*.log"], false).unwrap();
    assert_eq!(set.len(), 1);
    assert!(excluded(&set, "a.log", false));
}

#[test]
fn test_malformed_pattern_fails_compilation() {
    let err = RuleSet::compile(["*.ok", "file[0-9.txt"], false).unwrap_err();
    assert_eq!(err.pattern(), "file[0-9.txt");
}

#[test]
fn test_empty_rule_set_excludes_nothing() {
    let set = RuleSet::empty();
    assert!(set.is_empty());
    assert!(!excluded(&set, "anything", false));
    assert!(!excluded(&set, "any/where", true));
}

// Tree walker

#[test]
fn test_walker_prunes_excluded_directories() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let set = rules(&["build/", "*.log"]);

    let paths = walk_rel_paths(temp_dir.path(), set, WalkOptions::default());
    let expected: Vec<PathBuf> = ["b.txt", "src", "src/main.txt"]
        .iter()
        .map(PathBuf::from)
        .collect();
    assert_eq!(paths, expected);

    Ok(())
}

#[test]
fn test_walker_order_is_stable() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;

    let first = walk_rel_paths(temp_dir.path(), RuleSet::empty(), WalkOptions::default());
    let second = walk_rel_paths(temp_dir.path(), RuleSet::empty(), WalkOptions::default());
    assert_eq!(first, second);

    // Pre-order: a directory comes before its contents, siblings sorted by
    // name.
    let expected: Vec<PathBuf> = [
        "a.log",
        "b.txt",
        "build",
        "build/out.txt",
        "keep.log",
        "src",
        "src/main.txt",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(first, expected);

    Ok(())
}

#[test]
fn test_walker_negation_keeps_file() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let set = rules(&["*.log", "!keep.log"]);

    let paths = walk_rel_paths(temp_dir.path(), set, WalkOptions::default());
    assert!(!paths.contains(&PathBuf::from("a.log")));
    assert!(paths.contains(&PathBuf::from("keep.log")));

    Ok(())
}

#[test]
fn test_walker_reports_exclusions() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    let set = rules(&["build/", "*.log", "!keep.log"]);
    let walker = Walker::new(temp_dir.path(), set, WalkOptions::default());

    let mut excluded_paths = Vec::new();
    for entry in walker.walk(|rel, _is_dir| excluded_paths.push(rel.to_path_buf())) {
        entry.unwrap();
    }

    assert_eq!(
        excluded_paths,
        vec![PathBuf::from("a.log"), PathBuf::from("build")]
    );

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_walker_never_follows_links() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    std::os::unix::fs::symlink(temp_dir.path().join("src"), temp_dir.path().join("link"))?;

    let paths = walk_rel_paths(temp_dir.path(), RuleSet::empty(), WalkOptions::default());
    assert!(paths.contains(&PathBuf::from("link")));
    // The link target's contents are not reachable through the link.
    assert!(!paths.contains(&PathBuf::from("link/main.txt")));

    let without_links = walk_rel_paths(
        temp_dir.path(),
        RuleSet::empty(),
        WalkOptions { skip_links: true },
    );
    assert!(!without_links.contains(&PathBuf::from("link")));

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_walker_classifies_links() -> io::Result<()> {
    let temp_dir = setup_test_directory()?;
    std::os::unix::fs::symlink(temp_dir.path().join("b.txt"), temp_dir.path().join("ln"))?;

    let walker = Walker::new(temp_dir.path(), RuleSet::empty(), WalkOptions::default());
    let link = walker
        .walk(|_, _| {})
        .map(|entry| entry.unwrap())
        .find(|entry| entry.rel_path == Path::new("ln"))
        .unwrap();
    assert_eq!(link.kind, EntryKind::Symlink);

    Ok(())
}

// Attribute engine

#[test]
fn test_capture_reads_timestamps() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("f.txt");
    File::create(&path)?.write_all(b"hello")?;

    let mtime = FileTime::from_unix_time(1_600_000_000, 123_456_789);
    let atime = FileTime::from_unix_time(1_600_000_100, 0);
    filetime::set_file_times(&path, atime, mtime)?;

    let record = capture(&file_entry(path, "f.txt"), "f.txt".into(), &FsAccessor).unwrap();
    assert_eq!(record.kind, EntryKind::File);
    assert_eq!(record.modified, Some(1_600_000_000 * 1_000_000_000 + 123_456_789));
    assert_eq!(record.accessed, Some(1_600_000_100 * 1_000_000_000));

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_capture_reads_mode_and_owner() -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("f.txt");
    File::create(&path)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640))?;

    let record = capture(&file_entry(path, "f.txt"), "f.txt".into(), &FsAccessor).unwrap();
    assert_eq!(record.mode, Some(0o640));
    let owner = record.owner.unwrap();
    assert_eq!(owner.uid, unsafe { libc::getuid() });

    Ok(())
}

#[test]
fn test_capture_unreadable_entry_is_an_error() {
    let entry = file_entry(PathBuf::from("/no/such/entry/anywhere"), "gone");
    assert!(capture(&entry, "gone".into(), &FsAccessor).is_err());
}

#[test]
fn test_apply_roundtrip_restores_attributes() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("f.txt");
    File::create(&path)?.write_all(b"content")?;

    let mtime = FileTime::from_unix_time(1_500_000_000, 42);
    filetime::set_file_times(&path, mtime, mtime)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
    }

    let entry = file_entry(path.clone(), "f.txt");
    let record = capture(&entry, "f.txt".into(), &FsAccessor).unwrap();

    // Disturb everything the record covers.
    let noise = FileTime::from_unix_time(1_000, 0);
    filetime::set_file_times(&path, noise, noise)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    match apply(&record, &path, &FsAccessor, &RestoreOptions::new()) {
        ApplyOutcome::Applied { changes, failures } => {
            assert!(failures.is_empty());
            assert!(changes.contains(&Field::Modified));
        }
        other => panic!("expected Applied, got {other:?}"),
    }

    let again = capture(&entry, "f.txt".into(), &FsAccessor).unwrap();
    assert_eq!(again.modified, record.modified);
    assert_eq!(again.accessed, record.accessed);
    assert_eq!(again.mode, record.mode);

    // A second apply finds nothing to do.
    match apply(&record, &path, &FsAccessor, &RestoreOptions::new()) {
        ApplyOutcome::Applied { changes, failures } => {
            assert!(changes.is_empty());
            assert!(failures.is_empty());
        }
        other => panic!("expected Applied, got {other:?}"),
    }

    Ok(())
}

#[test]
fn test_apply_kind_mismatch_mutates_nothing() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let dir = temp_dir.path().join("was-a-file");
    fs::create_dir(&dir)?;

    let before = FsAccessor.timestamps(&dir).unwrap();

    let record = AttrRecord {
        path: "was-a-file".into(),
        kind: EntryKind::File,
        mode: Some(0o600),
        owner: None,
        created: None,
        modified: Some(1),
        accessed: Some(1),
        archive: None,
        hidden: None,
        readonly: None,
        system: None,
    };

    match apply(&record, &dir, &FsAccessor, &RestoreOptions::new()) {
        ApplyOutcome::Skipped(SkipReason::KindMismatch { expected, found }) => {
            assert_eq!(expected, EntryKind::File);
            assert_eq!(found, EntryKind::Directory);
        }
        other => panic!("expected kind mismatch, got {other:?}"),
    }

    let after = FsAccessor.timestamps(&dir).unwrap();
    assert_eq!(before.modified, after.modified);

    Ok(())
}

#[test]
fn test_apply_missing_target_is_skipped() {
    let record = AttrRecord {
        path: "gone".into(),
        kind: EntryKind::File,
        mode: None,
        owner: None,
        created: None,
        modified: Some(1),
        accessed: None,
        archive: None,
        hidden: None,
        readonly: None,
        system: None,
    };

    let target = Path::new("/no/such/entry/anywhere");
    match apply(&record, target, &FsAccessor, &RestoreOptions::new()) {
        ApplyOutcome::Skipped(SkipReason::Missing) => {}
        other => panic!("expected Skipped(Missing), got {other:?}"),
    }
}

#[test]
fn test_copy_to_access_uses_created_value() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("f.txt");
    File::create(&path)?;

    let entry = file_entry(path.clone(), "f.txt");
    let mut record = capture(&entry, "f.txt".into(), &FsAccessor).unwrap();

    let t1 = 1_400_000_000 * 1_000_000_000_i64;
    let t2 = 1_450_000_000 * 1_000_000_000_i64;
    record.created = Some(t1);
    record.accessed = Some(t2);

    let options = RestoreOptions::new().copy_to_access(true);
    match apply(&record, &path, &FsAccessor, &options) {
        ApplyOutcome::Applied { changes, failures } => {
            assert!(failures.is_empty());
            assert!(changes.contains(&Field::Accessed));
        }
        other => panic!("expected Applied, got {other:?}"),
    }

    let after = FsAccessor.timestamps(&path).unwrap();
    assert_eq!(after.accessed, Some(t1));

    Ok(())
}

#[test]
fn test_skip_switches_leave_fields_alone() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("f.txt");
    File::create(&path)?;

    let entry = file_entry(path.clone(), "f.txt");
    let mut record = capture(&entry, "f.txt".into(), &FsAccessor).unwrap();
    let current_modified = record.modified;

    record.modified = Some(7_000_000_000);

    let options = RestoreOptions::new().skip_modified(true);
    match apply(&record, &path, &FsAccessor, &options) {
        ApplyOutcome::Applied { changes, .. } => {
            assert!(!changes.contains(&Field::Modified));
        }
        other => panic!("expected Applied, got {other:?}"),
    }

    let after = FsAccessor.timestamps(&path).unwrap();
    assert_eq!(after.modified, current_modified);

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_skip_permissions_switch() -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("f.txt");
    File::create(&path)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;

    let entry = file_entry(path.clone(), "f.txt");
    let mut record = capture(&entry, "f.txt".into(), &FsAccessor).unwrap();
    record.mode = Some(0o644);

    let options = RestoreOptions::new().skip_permissions(true);
    match apply(&record, &path, &FsAccessor, &options) {
        ApplyOutcome::Applied { changes, .. } => assert!(!changes.contains(&Field::Permissions)),
        other => panic!("expected Applied, got {other:?}"),
    }
    assert_eq!(
        fs::symlink_metadata(&path)?.permissions().mode() & 0o7777,
        0o600
    );

    // Without the switch the stored mode is written back.
    match apply(&record, &path, &FsAccessor, &RestoreOptions::new()) {
        ApplyOutcome::Applied { changes, .. } => assert!(changes.contains(&Field::Permissions)),
        other => panic!("expected Applied, got {other:?}"),
    }
    assert_eq!(
        fs::symlink_metadata(&path)?.permissions().mode() & 0o7777,
        0o644
    );

    Ok(())
}

// Snapshot persistence

fn sample_record(path: &str) -> AttrRecord {
    AttrRecord {
        path: path.into(),
        kind: EntryKind::File,
        mode: Some(0o644),
        owner: None,
        created: None,
        modified: Some(1_600_000_000 * 1_000_000_000),
        accessed: Some(1_600_000_000 * 1_000_000_000),
        archive: None,
        hidden: None,
        readonly: None,
        system: None,
    }
}

#[test]
fn test_snapshot_roundtrip_preserves_absence() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let file = temp_dir.path().join("snap.json");

    let mut snapshot = Snapshot::new("/tree", true);
    assert!(snapshot.push(sample_record("a.txt")));
    snapshot.save(&file).unwrap();

    let raw = fs::read_to_string(&file)?;
    // Absent fields are not serialized at all.
    assert!(!raw.contains("\"owner\""));
    assert!(!raw.contains("\"created\""));
    assert!(!raw.contains("\"archive\""));

    let loaded = Snapshot::load(&file).unwrap();
    assert!(loaded.is_relative);
    assert_eq!(loaded.root_path, "/tree");
    assert_eq!(loaded.records, vec![sample_record("a.txt")]);
    assert_eq!(loaded.records[0].owner, None);

    Ok(())
}

#[test]
fn test_snapshot_rejects_duplicate_paths() {
    let mut snapshot = Snapshot::new("/tree", true);
    assert!(snapshot.push(sample_record("a.txt")));
    assert!(!snapshot.push(sample_record("a.txt")));
    assert_eq!(snapshot.len(), 1);
}

#[test]
fn test_snapshot_load_validations() -> io::Result<()> {
    let temp_dir = tempdir()?;

    let missing = temp_dir.path().join("missing.json");
    assert!(matches!(
        Snapshot::load(&missing),
        Err(SnapshotError::NotFound(_))
    ));

    assert!(matches!(
        Snapshot::load(temp_dir.path()),
        Err(SnapshotError::IsDirectory(_))
    ));

    let empty = temp_dir.path().join("empty.json");
    File::create(&empty)?;
    assert!(matches!(
        Snapshot::load(&empty),
        Err(SnapshotError::Empty(_))
    ));

    let no_records = temp_dir.path().join("norecords.json");
    fs::write(
        &no_records,
        r#"{"root_path": "/tree", "is_relative": true, "records": []}"#,
    )?;
    assert!(matches!(
        Snapshot::load(&no_records),
        Err(SnapshotError::NoRecords(_))
    ));

    let garbage = temp_dir.path().join("garbage.json");
    fs::write(&garbage, "not json at all")?;
    assert!(matches!(
        Snapshot::load(&garbage),
        Err(SnapshotError::Format { .. })
    ));

    Ok(())
}

#[test]
fn test_snapshot_load_rejects_duplicates() -> io::Result<()> {
    let temp_dir = tempdir()?;
    let file = temp_dir.path().join("dup.json");
    fs::write(
        &file,
        r#"{
            "root_path": "/tree",
            "is_relative": true,
            "records": [
                {"path": "a.txt", "kind": "file"},
                {"path": "a.txt", "kind": "file"}
            ]
        }"#,
    )?;
    assert!(matches!(
        Snapshot::load(&file),
        Err(SnapshotError::DuplicatePath { .. })
    ));

    Ok(())
}
