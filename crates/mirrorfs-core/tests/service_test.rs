//! Integration tests for the mirrorfs operation set
//!
//! These drive `FilesystemService` the way a dispatcher would, one call
//! per request.

use std::sync::Arc;
use std::thread;

use mirrorfs_core::{EntryKind, FilesystemService, FsError, ServiceOptions, Timestamps};

fn fs() -> FilesystemService {
    FilesystemService::default()
}

fn not_found(path: &str) -> FsError {
    FsError::NotFound(path.to_string())
}

#[test]
fn test_write_then_read_round_trip() {
    let fs = fs();
    fs.create("/a/b").unwrap();
    assert_eq!(fs.write("/a/b", b"payload", 0).unwrap(), 7);
    assert_eq!(fs.read("/a/b", 7, 0).unwrap(), b"payload");
}

#[test]
fn test_write_is_mirrored() {
    let fs = fs();
    fs.create("/a/b").unwrap();
    fs.write("/a/b", b"payload", 0).unwrap();
    assert_eq!(fs.read("/b/a", 7, 0).unwrap(), b"payload");
}

#[test]
fn test_mirror_write_goes_both_ways() {
    let fs = fs();
    fs.create("/a/b").unwrap();
    fs.write("/b/a", b"from the other side", 0).unwrap();
    assert_eq!(fs.read("/a/b", 64, 0).unwrap(), b"from the other side");
}

#[test]
fn test_unlink_does_not_cascade() {
    let fs = fs();
    fs.create("/a/b").unwrap();
    fs.write("/a/b", b"keep me", 0).unwrap();

    fs.unlink("/a/b").unwrap();

    assert_eq!(fs.getattr("/a/b").unwrap_err(), not_found("/a/b"));
    assert_eq!(fs.read("/b/a", 7, 0).unwrap(), b"keep me");
}

#[test]
fn test_write_after_unlink_of_mirror_still_succeeds() {
    let fs = fs();
    fs.create("/a/b").unwrap();
    fs.unlink("/b/a").unwrap();

    assert_eq!(fs.write("/a/b", b"solo", 0).unwrap(), 4);
    assert_eq!(fs.read("/a/b", 4, 0).unwrap(), b"solo");
    assert!(fs.getattr("/b/a").is_err());
}

#[test]
fn test_directory_listing() {
    let fs = fs();
    fs.mkdir("/tags").unwrap();
    fs.create("/tags/red").unwrap();

    assert_eq!(fs.readdir("/tags").unwrap(), vec![".", "..", "red"]);

    // The mirror is a separate entry under a path nobody listed
    assert_eq!(fs.getattr("/red/tags").unwrap().kind, EntryKind::File);
    assert_eq!(fs.readdir("/").unwrap(), vec![".", "..", "tags"]);
}

#[test]
fn test_listing_after_mkdir_of_mirror_parent() {
    let fs = fs();
    fs.mkdir("/tags").unwrap();
    fs.mkdir("/red").unwrap();
    fs.create("/tags/red").unwrap();

    assert_eq!(fs.readdir("/").unwrap(), vec![".", "..", "red", "tags"]);
    assert_eq!(fs.readdir("/red").unwrap(), vec![".", "..", "tags"]);
}

#[test]
fn test_growth_preserves_prefix() {
    let fs = fs();
    fs.create("/g/f").unwrap();

    let original: Vec<u8> = (0..100u8).map(|i| b'a' + i % 26).collect();
    fs.write("/g/f", &original, 0).unwrap();
    fs.write("/g/f", b"!", original.len() as u64).unwrap();

    let read = fs.read("/g/f", original.len() + 1, 0).unwrap();
    assert_eq!(&read[..original.len()], original.as_slice());
    assert_eq!(read[original.len()], b'!');
    assert_eq!(fs.read("/f/g", 200, 0).unwrap(), read);
}

#[test]
fn test_read_clips_and_past_end_is_empty() {
    let fs = fs();
    fs.mknod("/f").unwrap();
    fs.write("/f", b"0123456789", 0).unwrap();

    assert_eq!(fs.read("/f", 100, 6).unwrap(), b"6789");
    assert!(fs.read("/f", 4, 10).unwrap().is_empty());
    assert!(fs.read("/f", 4, 1000).unwrap().is_empty());
}

#[test]
fn test_unlink_missing_is_idempotent() {
    let fs = fs();
    let before = fs.entry_count();
    for _ in 0..3 {
        assert_eq!(fs.unlink("/ghost").unwrap_err(), not_found("/ghost"));
    }
    assert_eq!(fs.entry_count(), before);
}

#[test]
fn test_root_is_never_removed() {
    let fs = fs();
    assert_eq!(fs.rmdir("/").unwrap_err(), FsError::RootBusy);
    assert_eq!(fs.unlink("/").unwrap_err(), FsError::RootBusy);
    assert_eq!(fs.mkdir("/").unwrap_err(), FsError::AlreadyExists("/".into()));
    assert_eq!(fs.getattr("/").unwrap().kind, EntryKind::Directory);
}

#[test]
fn test_mkdir_and_mknod_conflicts() {
    let fs = fs();
    fs.mkdir("/d").unwrap();
    assert_eq!(fs.mkdir("/d").unwrap_err(), FsError::AlreadyExists("/d".into()));
    assert_eq!(fs.mknod("/d").unwrap_err(), FsError::AlreadyExists("/d".into()));

    fs.mknod("/n").unwrap();
    assert_eq!(fs.mknod("/n").unwrap_err(), FsError::AlreadyExists("/n".into()));
}

#[test]
fn test_mknod_is_not_mirrored() {
    let fs = fs();
    fs.mknod("/a/b").unwrap();
    fs.write("/a/b", b"x", 0).unwrap();
    assert!(fs.getattr("/b/a").is_err());
}

#[test]
fn test_create_conflict_is_not_an_error() {
    let fs = fs();
    fs.create("/a/b").unwrap();
    fs.write("/a/b", b"first", 0).unwrap();

    fs.create("/a/b").unwrap();
    assert_eq!(fs.read("/a/b", 5, 0).unwrap(), b"first");
    assert_eq!(fs.read("/b/a", 5, 0).unwrap(), b"first");
}

#[test]
fn test_create_depth_one_is_single() {
    let fs = fs();
    let before = fs.entry_count();
    fs.create("/top").unwrap();
    fs.write("/top", b"hi", 0).unwrap();
    assert_eq!(fs.entry_count(), before + 1);
    assert_eq!(fs.read("/top", 2, 0).unwrap(), b"hi");
}

#[test]
fn test_deep_create_mirrors_rotation() {
    let fs = fs();
    fs.create("/a/b/c").unwrap();
    fs.write("/a/b/c", b"deep", 0).unwrap();

    assert_eq!(fs.read("/b/c/a", 4, 0).unwrap(), b"deep");
    assert!(fs.getattr("/c/a/b").is_err());
}

#[test]
fn test_rmdir_leaves_children_addressable() {
    let fs = fs();
    fs.mkdir("/d").unwrap();
    fs.mknod("/d/f").unwrap();
    fs.write("/d/f", b"orphan", 0).unwrap();

    fs.rmdir("/d").unwrap();

    assert_eq!(fs.readdir("/d").unwrap_err(), not_found("/d"));
    assert_eq!(fs.readdir("/").unwrap(), vec![".", ".."]);
    assert_eq!(fs.read("/d/f", 6, 0).unwrap(), b"orphan");
}

#[test]
fn test_missing_paths_are_not_found() {
    let fs = fs();
    assert_eq!(fs.getattr("/x").unwrap_err(), not_found("/x"));
    assert_eq!(fs.open("/x").unwrap_err(), not_found("/x"));
    assert_eq!(fs.read("/x", 1, 0).unwrap_err(), not_found("/x"));
    assert_eq!(fs.write("/x", b"1", 0).unwrap_err(), not_found("/x"));
    assert_eq!(fs.rmdir("/x").unwrap_err(), not_found("/x"));
    assert_eq!(fs.readdir("/x").unwrap_err(), not_found("/x"));
}

#[test]
fn test_readdir_on_file_is_not_found() {
    let fs = fs();
    fs.mknod("/f").unwrap();
    assert_eq!(fs.readdir("/f").unwrap_err(), not_found("/f"));
}

#[test]
fn test_file_io_on_directory() {
    let fs = fs();
    fs.mkdir("/d").unwrap();
    assert_eq!(
        fs.read("/d", 1, 0).unwrap_err(),
        FsError::IsADirectory("/d".into())
    );
    assert_eq!(
        fs.write("/d", b"x", 0).unwrap_err(),
        FsError::IsADirectory("/d".into())
    );
}

#[test]
fn test_mirror_onto_directory_is_skipped() {
    let fs = fs();
    fs.mkdir("/b").unwrap();
    fs.mkdir("/b/a").unwrap();
    fs.create("/a/b").unwrap();

    assert_eq!(fs.write("/a/b", b"ok", 0).unwrap(), 2);
    assert_eq!(fs.getattr("/b/a").unwrap().kind, EntryKind::Directory);
}

#[test]
fn test_open_release_utimens() {
    let fs = fs();
    fs.mknod("/f").unwrap();
    fs.open("/f").unwrap();
    fs.open("/").unwrap();
    fs.release("/f").unwrap();
    fs.utimens("/f", Timestamps::default()).unwrap();
    assert_eq!(fs.getattr("/f").unwrap().size, 0);
}

#[test]
fn test_relative_path_rejected() {
    let fs = fs();
    assert_eq!(
        fs.mkdir("tags").unwrap_err(),
        FsError::InvalidPath("tags".into())
    );
}

#[test]
fn test_huge_offset_write_is_rejected_and_service_survives() {
    let fs = fs();
    fs.mknod("/f").unwrap();
    fs.write("/f", b"keep", 0).unwrap();

    assert_eq!(
        fs.write("/f", b"x", 1u64 << 46).unwrap_err(),
        FsError::FileTooLarge("/f".to_string())
    );
    assert_eq!(fs.read("/f", 16, 0).unwrap(), b"keep");

    fs.mknod("/g").unwrap();
    assert_eq!(fs.write("/g", b"still here", 0).unwrap(), 10);
}

#[test]
fn test_rejected_mirrored_write_touches_neither_side() {
    let fs = FilesystemService::new(ServiceOptions {
        max_file_size: 64,
        ..ServiceOptions::default()
    });
    fs.create("/a/b").unwrap();
    fs.write("/a/b", b"same", 0).unwrap();

    assert_eq!(
        fs.write("/a/b", b"overflow", 60).unwrap_err(),
        FsError::FileTooLarge("/a/b".to_string())
    );
    assert_eq!(fs.read("/a/b", 64, 0).unwrap(), b"same");
    assert_eq!(fs.read("/b/a", 64, 0).unwrap(), b"same");
}

#[test]
fn test_concurrent_mirrored_writes_stay_identical() {
    let fs = Arc::new(fs());
    fs.mkdir("/tags").unwrap();
    for i in 0..8 {
        fs.create(&format!("/tags/item{i}")).unwrap();
    }

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let path = format!("/tags/item{i}");
                for round in 0..50u64 {
                    let chunk = [b'a' + (round % 26) as u8; 16];
                    fs.write(&path, &chunk, round * 16).unwrap();
                    // Readers and listings interleave with the writers
                    fs.readdir("/tags").unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..8 {
        let primary = fs.read(&format!("/tags/item{i}"), 1024, 0).unwrap();
        let mirror = fs.read(&format!("/item{i}/tags"), 1024, 0).unwrap();
        assert_eq!(primary.len(), 800);
        assert_eq!(primary, mirror);
    }
    assert_eq!(fs.readdir("/tags").unwrap().len(), 10);
}
