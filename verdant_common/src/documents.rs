//! Typed reference documents.
//!
//! Recipes, device configurations, hardware setups and variable catalogs are
//! stored as JSON. These types are their serde shapes; semantic checks live
//! in [`crate::store::schema`].

use crate::consts::RECIPE_END;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A declarative, time-phased schedule of environment setpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDocument {
    pub name: String,
    pub uuid: String,
    /// Keyed environments; each carries a `name` plus variable setpoints.
    pub environments: BTreeMap<String, Map<String, Value>>,
    pub phases: Vec<RecipePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultivars: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultivation_methods: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipePhase {
    pub name: String,
    #[serde(default = "one")]
    pub repeat: u32,
    pub cycles: Vec<RecipeCycle>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCycle {
    pub name: String,
    /// Key into [`RecipeDocument::environments`].
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<f64>,
}

/// One compiled entry of a recipe's playback table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeTransition {
    pub minute: u64,
    pub phase: String,
    pub cycle: String,
    pub environment_name: String,
    pub environment_state: Map<String, Value>,
}

impl RecipeTransition {
    /// Terminal sentinel placed at the total recipe duration.
    pub fn end(minute: u64) -> Self {
        Self {
            minute,
            phase: RECIPE_END.to_string(),
            cycle: RECIPE_END.to_string(),
            environment_name: RECIPE_END.to_string(),
            environment_state: Map::new(),
        }
    }

    pub fn is_end(&self) -> bool {
        self.phase == RECIPE_END && self.cycle == RECIPE_END
    }
}

/// Device configuration: which peripherals and controllers to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub uuid: String,
    #[serde(default)]
    pub peripherals: Option<Vec<ActorConfig>>,
    #[serde(default)]
    pub controllers: Option<Vec<ActorConfig>>,
}

impl DeviceConfig {
    /// Configuration with no dynamic actors.
    pub fn empty(name: &str, uuid: &str) -> Self {
        Self {
            name: name.to_string(),
            uuid: uuid.to_string(),
            peripherals: None,
            controllers: None,
        }
    }
}

/// One peripheral or controller entry of a [`DeviceConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    pub name: String,
    /// Setup descriptor uuid.
    pub uuid: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Hardware setup: which implementation backs a peripheral or controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupDescriptor {
    pub uuid: String,
    pub name: String,
    pub module_name: String,
    pub class_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl SetupDescriptor {
    /// Registry key, `module.class`.
    pub fn factory_key(&self) -> String {
        format!("{}.{}", self.module_name, self.class_name)
    }
}

/// Entry of the sensor or actuator variable catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub info: Option<Value>,
}

/// Entry of the cultivar or cultivation-method library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Historical environment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub timestamp: DateTime<Utc>,
    pub state: Map<String, Value>,
}
