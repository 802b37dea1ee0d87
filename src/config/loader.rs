// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::node::ConfigNode;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file and return its root node.
///
/// This only performs TOML parsing; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigNode> {
    let contents = fs::read_to_string(path.as_ref())?;
    ConfigNode::parse(&contents)
}

/// Load a configuration file and check it can produce a set of watchers.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigNode> {
    let root = load_from_path(path)?;
    validate_config(&root)?;
    Ok(root)
}

/// Config file used when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("hotrunner.toml")
}

/// Directory that relative watch paths in `config_path` resolve against.
///
/// A bare file name (`hotrunner.toml`) resolves against the current
/// directory.
pub fn config_base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
