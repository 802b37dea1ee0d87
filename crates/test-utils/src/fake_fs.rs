//! An in-memory [`FileSystem`] holding only paths, no contents.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use hotrunner::fs::FileSystem;

#[derive(Debug, Default)]
struct Tree {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
    symlinks: BTreeSet<PathBuf>,
}

/// Paths are taken as given; tests should use absolute ones.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    tree: Arc<Mutex<Tree>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and all of its ancestor directories.
    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut tree = self.tree.lock().unwrap();
        tree.files.insert(path.to_path_buf());
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            tree.dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Mark an existing path as a symbolic link.
    pub fn mark_symlink(&self, path: impl AsRef<Path>) {
        self.tree.lock().unwrap().symlinks.insert(path.as_ref().to_path_buf());
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.tree.lock().unwrap().files.remove(path.as_ref());
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let tree = self.tree.lock().unwrap();
        tree.files.contains(path) || tree.dirs.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.tree.lock().unwrap().dirs.contains(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.tree.lock().unwrap().symlinks.contains(path)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("no such path: {}", path.display()))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let tree = self.tree.lock().unwrap();
        if !tree.dirs.contains(path) {
            return Err(anyhow!("not a directory: {}", path.display()));
        }
        Ok(tree
            .files
            .iter()
            .chain(tree.dirs.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect())
    }
}
