//! Integration tests for working-directory snapshots.

use std::path::PathBuf;
use workitem_agent::snapshot::DirectorySnapshot;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir()
        .join("workitem-agent-test")
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn capture_lists_regular_files_only() {
    let dir = scratch_dir();
    std::fs::write(dir.join("a.txt"), "a").unwrap();
    std::fs::write(dir.join("b.txt"), "b").unwrap();
    std::fs::create_dir(dir.join("nested")).unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink(dir.join("a.txt"), dir.join("link.txt")).unwrap();

    let snap = DirectorySnapshot::capture(&dir);
    assert_eq!(snap.len(), 2);
    assert!(snap.contains("a.txt"));
    assert!(snap.contains("b.txt"));
    assert!(!snap.contains("nested"));
    assert!(!snap.contains("link.txt"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn capture_of_missing_directory_is_empty() {
    let dir = std::env::temp_dir().join(format!("missing-{}", uuid::Uuid::new_v4()));
    assert!(DirectorySnapshot::capture(&dir).is_empty());
}

#[test]
fn diff_yields_exactly_the_new_files() {
    let dir = scratch_dir();
    std::fs::write(dir.join("keep.txt"), "x").unwrap();
    let before = DirectorySnapshot::capture(&dir);

    for i in 0..3 {
        std::fs::write(dir.join(format!("new-{i}.txt")), "y").unwrap();
    }
    let after = DirectorySnapshot::capture(&dir);

    let added = DirectorySnapshot::diff(&before, &after);
    assert_eq!(added.len(), 3);
    for name in &added {
        assert!(after.contains(name));
        assert!(!before.contains(name));
    }

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn diff_ignores_removed_files() {
    let dir = scratch_dir();
    std::fs::write(dir.join("gone.txt"), "x").unwrap();
    let before = DirectorySnapshot::capture(&dir);
    std::fs::remove_file(dir.join("gone.txt")).unwrap();
    let after = DirectorySnapshot::capture(&dir);

    assert!(DirectorySnapshot::diff(&before, &after).is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn cleanup_restores_baseline_and_is_idempotent() {
    let dir = scratch_dir();
    std::fs::write(dir.join("original.txt"), "keep me").unwrap();
    let baseline = DirectorySnapshot::capture(&dir);

    std::fs::write(dir.join("hello.txt"), "Hello kitty").unwrap();
    std::fs::write(dir.join("other.bin"), [0u8, 1, 2]).unwrap();

    DirectorySnapshot::cleanup(&dir, &baseline);
    let first = DirectorySnapshot::capture(&dir);
    assert_eq!(first, baseline);

    DirectorySnapshot::cleanup(&dir, &baseline);
    let second = DirectorySnapshot::capture(&dir);
    assert_eq!(second, first);
    assert_eq!(
        std::fs::read_to_string(dir.join("original.txt")).unwrap(),
        "keep me"
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn cleanup_leaves_new_directories_alone() {
    let dir = scratch_dir();
    let baseline = DirectorySnapshot::capture(&dir);
    std::fs::create_dir(dir.join("subdir")).unwrap();

    DirectorySnapshot::cleanup(&dir, &baseline);
    assert!(dir.join("subdir").is_dir());

    std::fs::remove_dir_all(&dir).unwrap();
}
