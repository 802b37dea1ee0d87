#![allow(dead_code)]

//! Builders that render hotrunner TOML documents for tests.

use std::fmt::Write;
use std::path::Path;

use hotrunner::config::ConfigNode;

/// Builder for a whole config document.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    excludes: Vec<String>,
    recursive: Option<bool>,
    timings: Vec<(String, String)>,
    watchers: Vec<WatcherBuilder>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_global_exclude(mut self, pattern: &str) -> Self {
        self.excludes.push(pattern.to_string());
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    /// Set `timings.<key> = "<value>"`.
    pub fn with_timing(mut self, key: &str, value: &str) -> Self {
        self.timings.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_watcher(mut self, watcher: WatcherBuilder) -> Self {
        self.watchers.push(watcher);
        self
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::new();
        if !self.excludes.is_empty() {
            writeln!(out, "excludes = {}", list(&self.excludes)).unwrap();
        }
        if let Some(recursive) = self.recursive {
            writeln!(out, "\n[params]\nrecursive = {recursive}").unwrap();
        }
        if !self.timings.is_empty() {
            writeln!(out, "\n[timings]").unwrap();
            for (key, value) in &self.timings {
                writeln!(out, "{key} = {value:?}").unwrap();
            }
        }
        for watcher in &self.watchers {
            watcher.write_toml(&mut out);
        }
        out
    }

    pub fn build(&self) -> ConfigNode {
        ConfigNode::parse(&self.to_toml()).expect("builder produced invalid TOML")
    }
}

/// Builder for one `[[watchers]]` entry.
#[derive(Debug, Clone)]
pub struct WatcherBuilder {
    name: Option<String>,
    duration: Option<String>,
    excludes: Vec<String>,
    kind: String,
    exec: String,
    params: Option<String>,
    args: Option<String>,
    directories: Vec<DirectoryBuilder>,
}

impl WatcherBuilder {
    pub fn new(kind: &str, exec: &str) -> Self {
        Self {
            name: None,
            duration: None,
            excludes: Vec::new(),
            kind: kind.to_string(),
            exec: exec.to_string(),
            params: None,
            args: None,
            directories: Vec::new(),
        }
    }

    pub fn custom(exec: &str) -> Self {
        Self::new("custom", exec)
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_duration(mut self, duration: &str) -> Self {
        self.duration = Some(duration.to_string());
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.excludes.push(pattern.to_string());
        self
    }

    pub fn with_params(mut self, params: &str) -> Self {
        self.params = Some(params.to_string());
        self
    }

    pub fn with_args(mut self, args: &str) -> Self {
        self.args = Some(args.to_string());
        self
    }

    pub fn with_directory(mut self, dir: DirectoryBuilder) -> Self {
        self.directories.push(dir);
        self
    }

    fn write_toml(&self, out: &mut String) {
        writeln!(out, "\n[[watchers]]").unwrap();
        if let Some(name) = &self.name {
            writeln!(out, "name = {name:?}").unwrap();
        }
        if let Some(duration) = &self.duration {
            writeln!(out, "duration = {duration:?}").unwrap();
        }
        if !self.excludes.is_empty() {
            writeln!(out, "excludes = {}", list(&self.excludes)).unwrap();
        }

        writeln!(out, "\n[watchers.command]").unwrap();
        writeln!(out, "type = {:?}", self.kind).unwrap();
        writeln!(out, "exec = {:?}", self.exec).unwrap();
        if let Some(params) = &self.params {
            writeln!(out, "params = {params:?}").unwrap();
        }
        if let Some(args) = &self.args {
            writeln!(out, "args = {args:?}").unwrap();
        }

        for dir in &self.directories {
            dir.write_toml(out);
        }
    }
}

/// Builder for one `[[watchers.directories]]` entry.
#[derive(Debug, Clone)]
pub struct DirectoryBuilder {
    path: String,
    includes: Vec<String>,
    excludes: Vec<String>,
    recursive: Option<bool>,
}

impl DirectoryBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().into_owned(),
            includes: Vec::new(),
            excludes: Vec::new(),
            recursive: None,
        }
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.includes.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.excludes.push(pattern.to_string());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    fn write_toml(&self, out: &mut String) {
        writeln!(out, "\n[[watchers.directories]]").unwrap();
        writeln!(out, "path = {:?}", self.path).unwrap();
        if !self.includes.is_empty() {
            writeln!(out, "includes = {}", list(&self.includes)).unwrap();
        }
        if !self.excludes.is_empty() {
            writeln!(out, "excludes = {}", list(&self.excludes)).unwrap();
        }
        if let Some(recursive) = self.recursive {
            writeln!(out, "recursive = {recursive}").unwrap();
        }
    }
}

fn list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("{s:?}")).collect();
    format!("[{}]", quoted.join(", "))
}
