//! Process-wide shared state.
//!
//! [`SharedState`] is the single document every actor reads and writes to
//! communicate. It is split into independent named sub-trees ([`Subtree`]),
//! each a JSON map. All access goes through one `parking_lot::Mutex`; reads
//! hand out owned clones so no reference outlives the lock.

pub mod stats;

use crate::consts::DEFAULT_GROUP_AVERAGE_WINDOW;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Named top-level sub-tree of the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtree {
    Device,
    Recipe,
    Environment,
    Peripherals,
    Controllers,
    Network,
    Iot,
    Resource,
    Upgrade,
}

impl Subtree {
    pub const ALL: [Subtree; 9] = [
        Subtree::Device,
        Subtree::Recipe,
        Subtree::Environment,
        Subtree::Peripherals,
        Subtree::Controllers,
        Subtree::Network,
        Subtree::Iot,
        Subtree::Resource,
        Subtree::Upgrade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subtree::Device => "device",
            Subtree::Recipe => "recipe",
            Subtree::Environment => "environment",
            Subtree::Peripherals => "peripherals",
            Subtree::Controllers => "controllers",
            Subtree::Network => "network",
            Subtree::Iot => "iot",
            Subtree::Resource => "resource",
            Subtree::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for Subtree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an actor mirrors its own fields: a sub-tree plus an optional key.
///
/// The coordinator lives at `device`, a peripheral named `SHT25-Top` at
/// `peripherals.SHT25-Top`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub subtree: Subtree,
    pub key: Option<String>,
}

impl Namespace {
    pub fn root(subtree: Subtree) -> Self {
        Self { subtree, key: None }
    }

    pub fn keyed(subtree: Subtree, key: impl Into<String>) -> Self {
        Self {
            subtree,
            key: Some(key.into()),
        }
    }

    /// Path of `field` inside [`Self::subtree`].
    pub fn path<'a>(&'a self, field: &'a str) -> Vec<&'a str> {
        match &self.key {
            Some(key) => vec![key.as_str(), field],
            None => vec![field],
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}.{}", self.subtree, key),
            None => write!(f, "{}", self.subtree),
        }
    }
}

/// The plain data behind [`SharedState`]. Serializes as the snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateTree {
    pub device: Map<String, Value>,
    pub recipe: Map<String, Value>,
    pub environment: Map<String, Value>,
    pub peripherals: Map<String, Value>,
    pub controllers: Map<String, Value>,
    pub network: Map<String, Value>,
    pub iot: Map<String, Value>,
    pub resource: Map<String, Value>,
    pub upgrade: Map<String, Value>,
}

impl StateTree {
    pub fn subtree(&self, subtree: Subtree) -> &Map<String, Value> {
        match subtree {
            Subtree::Device => &self.device,
            Subtree::Recipe => &self.recipe,
            Subtree::Environment => &self.environment,
            Subtree::Peripherals => &self.peripherals,
            Subtree::Controllers => &self.controllers,
            Subtree::Network => &self.network,
            Subtree::Iot => &self.iot,
            Subtree::Resource => &self.resource,
            Subtree::Upgrade => &self.upgrade,
        }
    }

    pub fn subtree_mut(&mut self, subtree: Subtree) -> &mut Map<String, Value> {
        match subtree {
            Subtree::Device => &mut self.device,
            Subtree::Recipe => &mut self.recipe,
            Subtree::Environment => &mut self.environment,
            Subtree::Peripherals => &mut self.peripherals,
            Subtree::Controllers => &mut self.controllers,
            Subtree::Network => &mut self.network,
            Subtree::Iot => &mut self.iot,
            Subtree::Resource => &mut self.resource,
            Subtree::Upgrade => &mut self.upgrade,
        }
    }

    /// Borrow the value at `path`, if every segment exists.
    pub fn get(&self, subtree: Subtree, path: &[&str]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut map = self.subtree(subtree);
        for key in parents {
            map = map.get(*key)?.as_object()?;
        }
        map.get(*last)
    }

    /// Write `value` at `path`, replacing non-map intermediates with maps.
    ///
    /// An empty path replaces the whole sub-tree when `value` is a map and
    /// is otherwise ignored.
    pub fn set(&mut self, subtree: Subtree, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            if let Value::Object(map) = value {
                *self.subtree_mut(subtree) = map;
            } else {
                tracing::warn!("Refusing to replace {subtree} with a non-map value");
            }
            return;
        };
        descend(self.subtree_mut(subtree), parents).insert(last.to_string(), value);
    }

    /// Remove and return the value at `path`.
    pub fn remove(&mut self, subtree: Subtree, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut map = self.subtree_mut(subtree);
        for key in parents {
            map = map.get_mut(*key)?.as_object_mut()?;
        }
        map.remove(*last)
    }
}

/// Walk (and create) nested maps along `path`.
pub(crate) fn descend<'a>(
    mut map: &'a mut Map<String, Value>,
    path: &[&str],
) -> &'a mut Map<String, Value> {
    for key in path {
        let slot = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        map = match slot {
            Value::Object(next) => next,
            _ => unreachable!("slot was coerced to a map"),
        };
    }
    map
}

/// Mutex-guarded [`StateTree`] shared by all actors.
#[derive(Debug)]
pub struct SharedState {
    tree: Mutex<StateTree>,
    group_average_window: u64,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Empty state with the default group-average window.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_GROUP_AVERAGE_WINDOW)
    }

    /// Empty state with a custom group-average window.
    pub fn with_window(group_average_window: u64) -> Self {
        Self {
            tree: Mutex::new(StateTree::default()),
            group_average_window: group_average_window.max(1),
        }
    }

    pub fn group_average_window(&self) -> u64 {
        self.group_average_window
    }

    /// Clone of the value at `path`. An empty path returns the whole sub-tree.
    pub fn get(&self, subtree: Subtree, path: &[&str]) -> Option<Value> {
        let tree = self.tree.lock();
        if path.is_empty() {
            return Some(Value::Object(tree.subtree(subtree).clone()));
        }
        tree.get(subtree, path).cloned()
    }

    /// Typed read. Absent, null and mismatched values all read as `None`.
    pub fn get_as<T: DeserializeOwned>(&self, subtree: Subtree, path: &[&str]) -> Option<T> {
        match self.get(subtree, path)? {
            Value::Null => None,
            value => serde_json::from_value(value).ok(),
        }
    }

    pub fn set(&self, subtree: Subtree, path: &[&str], value: impl Into<Value>) {
        self.tree.lock().set(subtree, path, value.into());
    }

    pub fn remove(&self, subtree: Subtree, path: &[&str]) -> Option<Value> {
        self.tree.lock().remove(subtree, path)
    }

    /// Empty one sub-tree.
    pub fn clear(&self, subtree: Subtree) {
        self.tree.lock().subtree_mut(subtree).clear();
    }

    /// Run `f` with the lock held for the whole multi-field update.
    pub fn update<R>(&self, f: impl FnOnce(&mut StateTree) -> R) -> R {
        f(&mut self.tree.lock())
    }

    /// Deep copy of the whole document.
    pub fn snapshot(&self) -> StateTree {
        self.tree.lock().clone()
    }

    /// Replace the whole document.
    pub fn restore(&self, tree: StateTree) {
        *self.tree.lock() = tree;
    }

    /// Merge a sensor reading into the environment statistics.
    ///
    /// See [`stats::record_sensor_value`] for the merge policy.
    pub fn report_sensor_value(&self, sensor: &str, variable: &str, value: Value, simple: bool) {
        let window = self.group_average_window;
        let mut tree = self.tree.lock();
        stats::record_sensor_value(&mut tree.environment, sensor, variable, value, simple, window);
    }
}
