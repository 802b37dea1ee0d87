// src/watch/path_utils.rs

use std::path::Path;

/// Convert `path` into a string relative to `root`, with forward slashes.
///
/// Tries a plain `strip_prefix` first and falls back to comparing
/// canonicalized paths, which differ on some platforms (macOS `/private`).
/// Returns `None` if `path` is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}
