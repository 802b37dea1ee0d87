// src/config/node.rs

//! Path-keyed accessors over a loaded TOML document.
//!
//! Keys are split on `.` or `:` so both `command.type` and `params:recursive`
//! address nested tables. A key that does not exist yields
//! [`HotrunnerError::MissingKey`]; a key with the wrong shape yields
//! [`HotrunnerError::InvalidValue`].

use std::time::Duration;

use toml::Value;

use crate::config::duration::parse_duration;
use crate::errors::{HotrunnerError, Result};

#[derive(Debug, Clone)]
pub struct ConfigNode {
    value: Value,
    /// Location of this node inside the document, for error messages.
    path: String,
}

impl ConfigNode {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            path: String::new(),
        }
    }

    /// Parse a TOML document into its root node.
    pub fn parse(text: &str) -> Result<Self> {
        let table: toml::Table = text.parse()?;
        Ok(Self::new(Value::Table(table)))
    }

    /// Location of this node (e.g. `watchers[1]`), empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.require(key)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.wrong_type(key, "a string", other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.require(key)? {
            Value::Boolean(b) => Ok(*b),
            other => Err(self.wrong_type(key, "a boolean", other)),
        }
    }

    /// Durations are strings like `"500ms"` / `"2s"`; bare integers are
    /// taken as milliseconds.
    pub fn get_duration(&self, key: &str) -> Result<Duration> {
        match self.require(key)? {
            Value::String(s) => parse_duration(s).map_err(|reason| HotrunnerError::InvalidValue {
                key: self.full_key(key),
                reason,
            }),
            Value::Integer(ms) if *ms >= 0 => Ok(Duration::from_millis(*ms as u64)),
            other => Err(self.wrong_type(key, "a duration string", other)),
        }
    }

    /// A list of strings. A single string is accepted as a one-element list.
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.require(key)? {
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.wrong_type(key, "a list of strings", other)),
                })
                .collect(),
            other => Err(self.wrong_type(key, "a list of strings", other)),
        }
    }

    /// A list of tables (`[[watchers]]`, `[[watchers.directories]]`, ...).
    pub fn get_node_list(&self, key: &str) -> Result<Vec<ConfigNode>> {
        match self.require(key)? {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Table(_) => Ok(ConfigNode {
                        value: item.clone(),
                        path: format!("{}[{idx}]", self.full_key(key)),
                    }),
                    other => Err(self.wrong_type(key, "a list of tables", other)),
                })
                .collect(),
            other => Err(self.wrong_type(key, "a list of tables", other)),
        }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split(['.', ':'])
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.value, |value, segment| value.get(segment))
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.lookup(key)
            .ok_or_else(|| HotrunnerError::MissingKey(self.full_key(key)))
    }

    fn full_key(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &Value) -> HotrunnerError {
        HotrunnerError::InvalidValue {
            key: self.full_key(key),
            reason: format!("expected {expected}, found {}", found.type_str()),
        }
    }
}
