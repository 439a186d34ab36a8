use notebook_core::{FileManager, FsError};
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, FileManager) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let files = FileManager::new(dir.path().join("nb")).expect("workspace should open");
    (dir, files)
}

#[test]
fn created_directory_is_listed_in_parent() {
    let (_dir, files) = setup();
    files.create_directory("journal/2024").unwrap();

    let listing = files.list_files("journal").unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].name, "2024");
    assert!(listing[0].is_directory);

    files.create_directory("journal/2024").expect("create is idempotent");
}

#[test]
fn rename_outside_root_is_rejected_and_target_untouched() {
    let (dir, files) = setup();
    files.write_file("x", b"note").unwrap();
    let outside = dir.path().join("passwd");
    fs::write(&outside, b"root:x:0:0").unwrap();

    let err = files
        .rename_file(files.root().join("x"), &outside)
        .expect_err("escaping rename must fail");
    assert!(matches!(err, FsError::OutsideRoot(_)));
    assert_eq!(fs::read(&outside).unwrap(), b"root:x:0:0");
    assert!(files.exists("x").unwrap());
}

#[test]
fn dot_dot_paths_cannot_escape() {
    let (_dir, files) = setup();
    let err = files.read_file("../secret").expect_err("escape must fail");
    assert!(matches!(err, FsError::OutsideRoot(_)));
    assert!(matches!(
        files.write_file("a/../../b", b"x"),
        Err(FsError::OutsideRoot(_))
    ));
}

#[cfg(unix)]
#[test]
fn symlink_to_outside_is_rejected() {
    let (dir, files) = setup();
    let outside = dir.path().join("outside");
    fs::create_dir(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, files.root().join("link")).unwrap();

    assert!(matches!(
        files.write_file("link/evil.md", b"x"),
        Err(FsError::OutsideRoot(_))
    ));
    assert!(!outside.join("evil.md").exists());
}

#[test]
fn move_into_directory_and_copy_tree() {
    let (_dir, files) = setup();
    files.write_file("drafts/a.md", b"alpha").unwrap();
    files.create_directory("archive").unwrap();

    let moved = files.move_file("drafts/a.md", "archive").unwrap();
    assert_eq!(moved, files.root().join("archive/a.md"));
    assert!(!files.exists("drafts/a.md").unwrap());

    let copied = files.copy_file("archive", "backup").unwrap();
    assert_eq!(fs::read(copied.join("a.md")).unwrap(), b"alpha");
    assert!(matches!(
        files.copy_file("archive/a.md", "backup"),
        Err(FsError::AlreadyExists(_))
    ));
}

#[test]
fn rename_checks_source_and_target() {
    let (_dir, files) = setup();
    files.write_file("a.md", b"a").unwrap();
    files.write_file("b.md", b"b").unwrap();

    assert!(matches!(
        files.rename_file("missing.md", "c.md"),
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        files.rename_file("a.md", "b.md"),
        Err(FsError::AlreadyExists(_))
    ));
    assert!(matches!(
        files.rename_file("a.md", "nowhere/c.md"),
        Err(FsError::NotFound(_))
    ));
    files.rename_file("a.md", "c.md").unwrap();
    assert_eq!(files.read_file("c.md").unwrap(), b"a");
}

#[test]
fn delete_is_recursive_but_spares_root() {
    let (_dir, files) = setup();
    files.write_file("box/inner/deep.md", b"deep").unwrap();

    files.delete_file("box").unwrap();
    assert!(!files.exists("box").unwrap());
    assert!(matches!(files.delete_file("box"), Err(FsError::NotFound(_))));
    assert!(matches!(
        files.delete_file(files.root()),
        Err(FsError::InvalidPath { .. })
    ));
}

#[test]
fn tree_search_and_size() {
    let (_dir, files) = setup();
    files.write_file("a.md", b"12345").unwrap();
    files.write_file("sub/b.md", b"123").unwrap();
    files.write_file("sub/c.txt", b"1").unwrap();

    let tree = files.file_tree(files.root()).unwrap();
    let names: Vec<_> = tree.children.iter().map(|node| node.info.name.as_str()).collect();
    assert_eq!(names, vec!["sub", "a.md"]);
    assert_eq!(tree.children[0].children.len(), 2);

    let shallow = files.search_files(files.root(), "*.md", false).unwrap();
    assert_eq!(shallow.len(), 1);
    let deep = files.search_files(files.root(), "?.md", true).unwrap();
    assert_eq!(deep.len(), 2);
    assert!(matches!(
        files.search_files(files.root(), "  ", true),
        Err(FsError::InvalidPath { .. })
    ));

    assert_eq!(files.directory_size(files.root()).unwrap(), 9);
}
