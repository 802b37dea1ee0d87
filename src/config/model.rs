// src/config/model.rs

//! Typed views over the config document.
//!
//! ```toml
//! excludes = [".git/**"]
//!
//! [params]
//! recursive = true
//!
//! [timings]
//! settle = "200ms"
//! rewatch = "500ms"
//! shutdown_grace = "1s"
//!
//! [[watchers]]
//! name = "api"
//! duration = "2s"
//!
//! [watchers.command]
//! type = "builtin.go.run"
//! exec = "api"
//! params = "./cmd/api"
//! args = "-port 8080"
//!
//! [[watchers.directories]]
//! path = "."
//! includes = ["**/*.go"]
//! excludes = ["vendor"]
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::config::node::ConfigNode;
use crate::errors::{HotrunnerError, MissingKeyExt, Result};
use crate::types::WatcherKind;

/// Name given to a watcher without a `name` key.
pub const UNKNOWN_WATCHER_NAME: &str = "UNKNOWN";

/// Quiet period used when a watcher has no `duration`.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

/// Fixed pauses used by the engine, overridable via `[timings]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause after killing a still-running step before respawning it.
    pub settle: Duration,
    /// Delay between a removal event and the existence re-check.
    pub rewatch: Duration,
    /// How long the manager waits for units to wind down on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            rewatch: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

impl Timings {
    pub fn from_node(root: &ConfigNode) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            settle: root
                .get_duration("timings.settle")
                .optional()?
                .unwrap_or(defaults.settle),
            rewatch: root
                .get_duration("timings.rewatch")
                .optional()?
                .unwrap_or(defaults.rewatch),
            shutdown_grace: root
                .get_duration("timings.shutdown_grace")
                .optional()?
                .unwrap_or(defaults.shutdown_grace),
        })
    }
}

/// Settings read from the top level of the document and threaded into every
/// watcher at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedOptions {
    /// Directory relative watch paths are resolved against (the config
    /// file's directory).
    pub base_dir: PathBuf,
    /// Global exclude patterns, appended to every directory's excludes.
    pub excludes: Vec<String>,
    /// `params.recursive`: default for directories that don't set it.
    pub recursive: bool,
    pub timings: Timings,
}

impl Default for SharedOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            excludes: Vec::new(),
            recursive: true,
            timings: Timings::default(),
        }
    }
}

impl SharedOptions {
    pub fn from_node(root: &ConfigNode) -> Result<Self> {
        Ok(Self {
            base_dir: PathBuf::from("."),
            excludes: root.get_string_list("excludes").optional()?.unwrap_or_default(),
            recursive: root.get_bool("params.recursive").optional()?.unwrap_or(true),
            timings: Timings::from_node(root)?,
        })
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }
}

/// `[watchers.command]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub kind: WatcherKind,
    pub exec: String,
    /// Arguments for the primary invocation (for the builtin kinds: the
    /// build step).
    pub params: String,
    /// Extra arguments (for the builtin kinds: passed to the built binary).
    pub args: String,
}

impl CommandSpec {
    pub fn from_node(node: &ConfigNode) -> Result<Self> {
        let kind_str = node.get_string("command.type")?;
        let kind = WatcherKind::from_str(&kind_str).map_err(HotrunnerError::UnknownWatcherType)?;
        let exec = node.get_string("command.exec")?;
        if exec.trim().is_empty() {
            return Err(HotrunnerError::ConfigError(format!(
                "{}: command.exec must not be empty",
                node.path()
            )));
        }

        Ok(Self {
            kind,
            exec,
            params: node.get_string("command.params").optional()?.unwrap_or_default(),
            args: node.get_string("command.args").optional()?.unwrap_or_default(),
        })
    }
}

/// One `[[watchers.directories]]` entry: a root plus the patterns resolved
/// against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub path: PathBuf,
    pub includes: Vec<String>,
    /// Effective excludes: directory, watcher and global lists, de-duplicated.
    pub excludes: Vec<String>,
    pub recursive: bool,
}

impl WatchSpec {
    pub fn from_node(
        node: &ConfigNode,
        unit_excludes: &[String],
        shared: &SharedOptions,
    ) -> Result<Self> {
        let path = node.get_string("path")?;
        let includes = node.get_string_list("includes").optional()?.unwrap_or_default();

        let mut excludes = node.get_string_list("excludes").optional()?.unwrap_or_default();
        excludes.extend(unit_excludes.iter().cloned());
        excludes.extend(shared.excludes.iter().cloned());

        let recursive = node
            .get_bool("recursive")
            .optional()?
            .unwrap_or(shared.recursive);

        let path = PathBuf::from(path);
        let path = if path.is_absolute() {
            path
        } else {
            shared.base_dir.join(path)
        };

        Ok(Self {
            path,
            includes,
            excludes: dedup_preserving_order(excludes),
            recursive,
        })
    }
}

/// Everything a watch unit reads from its `[[watchers]]` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitMeta {
    pub name: String,
    pub quiet_period: Duration,
    pub directories: Vec<WatchSpec>,
    pub timings: Timings,
}

impl Default for UnitMeta {
    fn default() -> Self {
        Self {
            name: UNKNOWN_WATCHER_NAME.to_string(),
            quiet_period: DEFAULT_QUIET_PERIOD,
            directories: Vec::new(),
            timings: Timings::default(),
        }
    }
}

impl UnitMeta {
    pub fn from_node(node: &ConfigNode, shared: &SharedOptions) -> Result<Self> {
        let name = node
            .get_string("name")
            .optional()?
            .unwrap_or_else(|| UNKNOWN_WATCHER_NAME.to_string());
        let quiet_period = node
            .get_duration("duration")
            .optional()?
            .unwrap_or(DEFAULT_QUIET_PERIOD);
        let unit_excludes = node.get_string_list("excludes").optional()?.unwrap_or_default();

        let directories = node
            .get_node_list("directories")?
            .iter()
            .map(|dir| WatchSpec::from_node(dir, &unit_excludes, shared))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name,
            quiet_period,
            directories,
            timings: shared.timings,
        })
    }
}

/// Remove duplicates, keeping the first occurrence of each item.
pub fn dedup_preserving_order<T>(items: Vec<T>) -> Vec<T>
where
    T: Eq + std::hash::Hash + Clone,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
