// src/config/validate.rs

use crate::config::model::{CommandSpec, SharedOptions, UnitMeta};
use crate::config::node::ConfigNode;
use crate::errors::{HotrunnerError, Result};

/// Check that the document describes at least one well-formed watcher.
///
/// This runs the same typed readers the manager uses, so anything accepted
/// here will also construct.
pub fn validate_config(root: &ConfigNode) -> Result<()> {
    let shared = SharedOptions::from_node(root)?;
    let watchers = ensure_has_watchers(root)?;

    for watcher in watchers.iter() {
        CommandSpec::from_node(watcher)?;
        let meta = UnitMeta::from_node(watcher, &shared)?;
        ensure_has_directories(watcher, &meta)?;
    }

    Ok(())
}

fn ensure_has_watchers(root: &ConfigNode) -> Result<Vec<ConfigNode>> {
    let watchers = match root.get_node_list("watchers") {
        Ok(list) => list,
        Err(HotrunnerError::MissingKey(_)) => Vec::new(),
        Err(err) => return Err(err),
    };

    if watchers.is_empty() {
        return Err(HotrunnerError::ConfigError(
            "config must contain at least one [[watchers]] section".to_string(),
        ));
    }
    Ok(watchers)
}

fn ensure_has_directories(node: &ConfigNode, meta: &UnitMeta) -> Result<()> {
    if meta.directories.is_empty() {
        return Err(HotrunnerError::ConfigError(format!(
            "{}: watcher '{}' must list at least one [[watchers.directories]] entry",
            node.path(),
            meta.name
        )));
    }
    Ok(())
}
