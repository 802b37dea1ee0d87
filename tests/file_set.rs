use std::fs;
use std::path::{Path, PathBuf};

use hotrunner::config::WatchSpec;
use hotrunner::errors::HotrunnerError;
use hotrunner::fs::RealFileSystem;
use hotrunner::watch::{resolve_file_set, resolve_watch_specs};
use hotrunner_test_utils::fake_fs::MockFileSystem;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn project() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.go");
    fs.add_file("/proj/README.md");
    fs.add_file("/proj/src/server.go");
    fs.add_file("/proj/src/deep/handler.go");
    fs.add_file("/proj/vendor/lib.go");
    fs
}

fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}

#[test]
fn double_star_spans_directories_and_excluded_dirs_are_pruned() {
    let fs = project();
    let files = resolve_file_set(
        &fs,
        Path::new("/proj"),
        &strings(&["**/*.go"]),
        &strings(&["vendor"]),
        true,
    )
    .unwrap();

    assert_eq!(
        sorted(files),
        vec![
            PathBuf::from("/proj/main.go"),
            PathBuf::from("/proj/src/deep/handler.go"),
            PathBuf::from("/proj/src/server.go"),
        ]
    );
}

#[test]
fn single_star_stays_in_one_segment() {
    let fs = project();
    let files = resolve_file_set(&fs, Path::new("/proj"), &strings(&["*.go"]), &[], true).unwrap();
    assert_eq!(files, vec![PathBuf::from("/proj/main.go")]);

    let files = resolve_file_set(&fs, Path::new("/proj"), &strings(&["src/*.go"]), &[], true).unwrap();
    assert_eq!(files, vec![PathBuf::from("/proj/src/server.go")]);
}

#[test]
fn non_recursive_only_looks_at_direct_children() {
    let fs = project();
    let files = resolve_file_set(&fs, Path::new("/proj"), &strings(&["**/*.go"]), &[], false).unwrap();
    assert_eq!(files, vec![PathBuf::from("/proj/main.go")]);
}

#[test]
fn file_patterns_can_be_excluded() {
    let fs = project();
    let files = resolve_file_set(
        &fs,
        Path::new("/proj"),
        &strings(&["**/*"]),
        &strings(&["**/*.go"]),
        true,
    )
    .unwrap();

    // Directories match `**/*` too; only `.go` files are gone.
    assert!(files.contains(&PathBuf::from("/proj/README.md")));
    assert!(files.contains(&PathBuf::from("/proj/src")));
    assert!(!files.iter().any(|p| p.extension().is_some_and(|e| e == "go")));
}

#[test]
fn no_includes_means_nothing_is_watched() {
    let fs = project();
    let files = resolve_file_set(&fs, Path::new("/proj"), &[], &[], true).unwrap();
    assert!(files.is_empty());
}

#[test]
fn directory_entries_of_a_unit_are_unioned_without_duplicates() {
    let fs = project();
    let specs = vec![
        WatchSpec {
            path: PathBuf::from("/proj"),
            includes: strings(&["**/*.go"]),
            excludes: strings(&["vendor"]),
            recursive: true,
        },
        WatchSpec {
            path: PathBuf::from("/proj/src"),
            includes: strings(&["*.go"]),
            excludes: Vec::new(),
            recursive: true,
        },
        WatchSpec {
            path: PathBuf::from("/proj"),
            includes: Vec::new(),
            excludes: Vec::new(),
            recursive: true,
        },
    ];

    let files = resolve_watch_specs(&fs, &specs).unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(
        files
            .iter()
            .filter(|p| **p == PathBuf::from("/proj/src/server.go"))
            .count(),
        1
    );
}

#[test]
fn invalid_patterns_are_rejected() {
    let fs = project();
    let err = resolve_file_set(&fs, Path::new("/proj"), &strings(&["src/[.go"]), &[], true).unwrap_err();
    assert!(matches!(err, HotrunnerError::GlobError(_)));
}

#[test]
fn root_must_be_a_directory() {
    let fs = project();
    let err = resolve_file_set(&fs, Path::new("/proj/main.go"), &strings(&["*"]), &[], true).unwrap_err();
    assert!(matches!(err, HotrunnerError::ConfigError(_)));
}

#[test]
fn real_directories_resolve_to_absolute_canonical_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/nested")).unwrap();
    fs::write(dir.path().join("src/a.rs"), "").unwrap();
    fs::write(dir.path().join("src/nested/b.rs"), "").unwrap();
    fs::write(dir.path().join("src/nested/c.txt"), "").unwrap();

    let root = dir.path().canonicalize().unwrap();
    let files = resolve_file_set(&RealFileSystem, dir.path(), &strings(&["**/*.rs"]), &[], true).unwrap();

    assert_eq!(
        sorted(files),
        vec![root.join("src/a.rs"), root.join("src/nested/b.rs")]
    );
}

#[test]
fn symlinked_directories_are_not_descended_into() {
    let fs = project();
    fs.add_file("/proj/mirror/main.go");
    fs.mark_symlink("/proj/mirror");

    let files = resolve_file_set(&fs, Path::new("/proj"), &strings(&["**/*.go"]), &strings(&["vendor"]), true)
        .unwrap();

    assert!(!files.iter().any(|f| f.starts_with("/proj/mirror")), "got {files:?}");
    assert_eq!(files.len(), 3);
}

#[cfg(unix)]
#[test]
fn symlink_cycle_resolves_each_file_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.go"), "").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

    let root = dir.path().canonicalize().unwrap();
    let files = resolve_file_set(&RealFileSystem, dir.path(), &strings(&["**/*.go"]), &[], true).unwrap();

    assert_eq!(files, vec![root.join("a.go")]);
}
