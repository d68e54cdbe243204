// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered string property bags attached to nodes, ports and links.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Well-known property keys.
pub mod keys {
    /// "true" when the node's clock may drive a component.
    pub const NODE_DRIVER: &str = "node.driver";
    /// Whether Idle sends a Pause command to the backend. Defaults to true.
    pub const NODE_PAUSE_ON_IDLE: &str = "node.pause-on-idle";
    /// Keep the node in the target list even when it has no active links.
    pub const NODE_ALWAYS_PROCESS: &str = "node.always-process";
    /// Human-readable node description.
    pub const NODE_DESCRIPTION: &str = "node.description";
    /// Media class, e.g. "Audio/Source" or "Audio/Sink".
    pub const MEDIA_CLASS: &str = "media.class";
    /// Monitor port flag.
    pub const PORT_MONITOR: &str = "port.monitor";
}

/// An ordered map of string properties.
///
/// Iteration order equals insertion order, which keeps event payloads and
/// log output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    entries: IndexMap<SmolStr, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<SmolStr>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style insertion for construction sites.
    pub fn with(mut self, key: impl Into<SmolStr>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into self, overwriting existing keys.
    pub fn merge(&mut self, other: &Properties) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Parse a boolean property. Accepts "true"/"false" and "1"/"0".
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Whether the node declares itself driver-capable.
    pub fn is_driver(&self) -> bool {
        self.flag(keys::NODE_DRIVER).unwrap_or(false)
    }

    /// Whether Idle should send Pause to the backend. Defaults to true.
    pub fn pause_on_idle(&self) -> bool {
        self.flag(keys::NODE_PAUSE_ON_IDLE).unwrap_or(true)
    }

    /// Whether the node processes even without active links.
    pub fn always_process(&self) -> bool {
        self.flag(keys::NODE_ALWAYS_PROCESS).unwrap_or(false)
    }

    pub fn media_class(&self) -> Option<&str> {
        self.get(keys::MEDIA_CLASS)
    }
}

impl FromIterator<(SmolStr, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (SmolStr, String)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

#[cfg(test)]
#[path = "properties_tests.rs"]
mod tests;
