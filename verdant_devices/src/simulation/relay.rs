//! Setpoint relay controller.
//!
//! Copies desired sensor setpoints into desired actuator values, one pair per
//! entry of the `mapping` parameter:
//!
//! ```json
//! { "mapping": { "air_temperature_celsius": "heater_setpoint_celsius" } }
//! ```

use crate::context::DynamicActorContext;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;
use verdant_common::actor::{Duty, DutyError};
use verdant_common::state::{Namespace, SharedState, Subtree};

const DEFAULT_INTERVAL_S: f64 = 1.0;

pub struct SetpointRelay {
    name: String,
    namespace: Namespace,
    raw_mapping: Option<Value>,
    mapping: Vec<(String, String)>,
    interval: Duration,
}

impl SetpointRelay {
    pub fn new(context: &DynamicActorContext) -> Self {
        let seconds = context
            .setting("interval_seconds")
            .and_then(Value::as_f64)
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_INTERVAL_S);
        Self {
            name: context.name().to_string(),
            namespace: context.namespace(),
            raw_mapping: context.setting("mapping").cloned(),
            mapping: Vec::new(),
            interval: Duration::from_secs_f64(seconds),
        }
    }

    fn parse_mapping(&self) -> Result<Vec<(String, String)>, DutyError> {
        let invalid = || {
            DutyError::Config(format!(
                "{}: mapping must be a non-empty object of variable names",
                self.name
            ))
        };
        let object = self
            .raw_mapping
            .as_ref()
            .and_then(Value::as_object)
            .ok_or_else(invalid)?;
        let pairs: Vec<(String, String)> = object
            .iter()
            .map(|(sensor, actuator)| {
                actuator
                    .as_str()
                    .map(|actuator| (sensor.clone(), actuator.to_string()))
                    .ok_or_else(invalid)
            })
            .collect::<Result<_, _>>()?;
        if pairs.is_empty() {
            return Err(invalid());
        }
        Ok(pairs)
    }
}

impl Duty for SetpointRelay {
    fn interval(&self, _state: &SharedState) -> Duration {
        self.interval
    }

    fn start(&mut self, _state: &SharedState) -> Result<(), DutyError> {
        self.mapping = self.parse_mapping()?;
        info!("🔁 {}: relaying {} setpoint(s)", self.name, self.mapping.len());
        Ok(())
    }

    async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
        let mapping = &self.mapping;
        let namespace = &self.namespace;
        state.update(|tree| {
            let mut applied = Map::new();
            for (sensor, actuator) in mapping {
                let value = tree
                    .get(Subtree::Environment, &["sensor", "desired", sensor.as_str()])
                    .cloned()
                    .unwrap_or(Value::Null);
                tree.set(
                    Subtree::Environment,
                    &["actuator", "desired", actuator.as_str()],
                    value.clone(),
                );
                applied.insert(actuator.clone(), value);
            }
            tree.set(
                namespace.subtree,
                &namespace.path("applied"),
                Value::Object(applied),
            );
        });
        Ok(())
    }
}
