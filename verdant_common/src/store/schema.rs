//! Reference document validation.
//!
//! Each document kind is checked in two steps: it must deserialize into its
//! typed shape, then it must pass the semantic rules below.

use crate::documents::{
    DeviceConfig, LibraryEntry, RecipeDocument, SetupDescriptor, VariableDescriptor,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Kinds of reference document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    SensorVariables,
    ActuatorVariables,
    Cultivars,
    CultivationMethods,
    PeripheralSetup,
    ControllerSetup,
    DeviceConfig,
    Recipe,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::SensorVariables => "sensor_variables",
            SchemaKind::ActuatorVariables => "actuator_variables",
            SchemaKind::Cultivars => "cultivars",
            SchemaKind::CultivationMethods => "cultivation_methods",
            SchemaKind::PeripheralSetup => "peripheral_setup",
            SchemaKind::ControllerSetup => "controller_setup",
            SchemaKind::DeviceConfig => "device_config",
            SchemaKind::Recipe => "recipe",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid {kind} document: {reason}")]
pub struct SchemaError {
    pub kind: SchemaKind,
    pub reason: String,
}

impl SchemaError {
    fn new(kind: SchemaKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Validate `document` against the rules for `kind`.
pub fn validate(document: &Value, kind: SchemaKind) -> Result<(), SchemaError> {
    match kind {
        SchemaKind::SensorVariables | SchemaKind::ActuatorVariables => {
            let variables: Vec<VariableDescriptor> = decode(document, kind)?;
            unique(kind, variables.iter().map(|v| v.key.as_str()), "key")
        }
        SchemaKind::Cultivars | SchemaKind::CultivationMethods => {
            let entries: Vec<LibraryEntry> = decode(document, kind)?;
            for entry in &entries {
                non_empty(kind, "uuid", &entry.uuid)?;
                non_empty(kind, "name", &entry.name)?;
            }
            unique(kind, entries.iter().map(|e| e.uuid.as_str()), "uuid")
        }
        SchemaKind::PeripheralSetup | SchemaKind::ControllerSetup => {
            let setup: SetupDescriptor = decode(document, kind)?;
            check_setup(kind, &setup)
        }
        SchemaKind::DeviceConfig => {
            let config: DeviceConfig = decode(document, kind)?;
            check_device_config(&config)
        }
        SchemaKind::Recipe => {
            let recipe: RecipeDocument = decode(document, kind)?;
            check_recipe(&recipe)
        }
    }
}

/// Validate and convert in one step.
pub fn decode<T: DeserializeOwned>(document: &Value, kind: SchemaKind) -> Result<T, SchemaError> {
    serde_json::from_value(document.clone()).map_err(|e| SchemaError::new(kind, e.to_string()))
}

fn non_empty(kind: SchemaKind, field: &str, value: &str) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::new(kind, format!("{field} must not be empty")));
    }
    Ok(())
}

fn unique<'a>(
    kind: SchemaKind,
    values: impl Iterator<Item = &'a str>,
    field: &str,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for value in values {
        non_empty(kind, field, value)?;
        if !seen.insert(value) {
            return Err(SchemaError::new(kind, format!("duplicate {field} '{value}'")));
        }
    }
    Ok(())
}

fn check_setup(kind: SchemaKind, setup: &SetupDescriptor) -> Result<(), SchemaError> {
    non_empty(kind, "uuid", &setup.uuid)?;
    non_empty(kind, "name", &setup.name)?;
    non_empty(kind, "module_name", &setup.module_name)?;
    non_empty(kind, "class_name", &setup.class_name)
}

fn check_device_config(config: &DeviceConfig) -> Result<(), SchemaError> {
    let kind = SchemaKind::DeviceConfig;
    non_empty(kind, "uuid", &config.uuid)?;
    non_empty(kind, "name", &config.name)?;

    let entries = config
        .peripherals
        .iter()
        .flatten()
        .chain(config.controllers.iter().flatten());
    let mut names = HashSet::new();
    for entry in entries {
        non_empty(kind, "setup uuid", &entry.uuid)?;
        non_empty(kind, "actor name", &entry.name)?;
        if !names.insert(entry.name.as_str()) {
            return Err(SchemaError::new(
                kind,
                format!("duplicate actor name '{}'", entry.name),
            ));
        }
    }
    Ok(())
}

fn check_recipe(recipe: &RecipeDocument) -> Result<(), SchemaError> {
    let kind = SchemaKind::Recipe;
    non_empty(kind, "uuid", &recipe.uuid)?;
    non_empty(kind, "name", &recipe.name)?;

    for (key, environment) in &recipe.environments {
        if !environment.get("name").is_some_and(Value::is_string) {
            return Err(SchemaError::new(
                kind,
                format!("environment '{key}' has no name"),
            ));
        }
    }

    for phase in &recipe.phases {
        for cycle in &phase.cycles {
            if !recipe.environments.contains_key(&cycle.environment) {
                return Err(SchemaError::new(
                    kind,
                    format!(
                        "cycle '{}' of phase '{}' references unknown environment '{}'",
                        cycle.name, phase.name, cycle.environment
                    ),
                ));
            }
            if cycle.duration_hours.is_none() && cycle.duration_minutes.is_none() {
                return Err(SchemaError::new(
                    kind,
                    format!("cycle '{}' of phase '{}' has no duration", cycle.name, phase.name),
                ));
            }
        }
    }
    Ok(())
}
