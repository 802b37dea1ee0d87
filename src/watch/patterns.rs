// src/watch/patterns.rs

//! Resolve `includes` / `excludes` glob lists into a concrete file set.
//!
//! Patterns are evaluated against paths relative to the directory root,
//! with forward slashes (`src/main.go`). `*` never crosses a `/`; `**`
//! spans any number of segments.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use crate::config::model::{WatchSpec, dedup_preserving_order};
use crate::errors::{HotrunnerError, Result};
use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;

/// Walk `root` and return every path matching `includes` and no pattern in
/// `excludes`.
///
/// - An excluded directory is not descended into, nor is a symlinked one.
/// - With `recursive = false` only the root's direct children are considered.
/// - Returned paths are absolute (under the canonicalized root), in walk
///   order, without duplicates.
pub fn resolve_file_set(
    fs: &dyn FileSystem,
    root: &Path,
    includes: &[String],
    excludes: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    if includes.is_empty() {
        return Ok(Vec::new());
    }

    let root = fs.canonicalize(root)?;
    if !fs.is_dir(&root) {
        return Err(HotrunnerError::ConfigError(format!(
            "watch path {} is not a directory",
            root.display()
        )));
    }

    let include_set = build_globset(includes)?;
    let exclude_set = build_globset(excludes)?;

    let mut files = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(dir) = stack.pop() {
        let mut entries = fs.read_dir(&dir)?;
        entries.sort();

        let mut subdirs = Vec::new();
        for path in entries {
            let Some(rel) = relative_str(&root, &path) else {
                continue;
            };
            if exclude_set.is_match(&rel) {
                debug!(path = %rel, "excluded from watch set");
                continue;
            }
            if include_set.is_match(&rel) {
                files.push(path.clone());
            }
            // Symlinked directories are matched but never walked, so a link
            // pointing back up the tree cannot alias the same files.
            if recursive && fs.is_dir(&path) && !fs.is_symlink(&path) {
                subdirs.push(path);
            }
        }
        // Reversed so subdirectories are popped in name order.
        stack.extend(subdirs.into_iter().rev());
    }

    Ok(dedup_preserving_order(files))
}

/// Union of the file sets of every directory entry of one unit.
pub fn resolve_watch_specs(fs: &dyn FileSystem, specs: &[WatchSpec]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for spec in specs {
        if spec.includes.is_empty() {
            warn!(path = %spec.path.display(), "directory has no includes; nothing watched there");
            continue;
        }
        let resolved = resolve_file_set(
            fs,
            &spec.path,
            &spec.includes,
            &spec.excludes,
            spec.recursive,
        )?;
        debug!(path = %spec.path.display(), files = resolved.len(), "resolved watch directory");
        files.extend(resolved);
    }
    Ok(dedup_preserving_order(files))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat).literal_separator(true).build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
