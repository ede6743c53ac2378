//! Simulated multi-variable sensor.
//!
//! Each poll moves every reading a fraction of the way toward its target and
//! reports it through the sensor merge. The target is the desired setpoint
//! when one is set, otherwise the baseline from the setup properties.

use crate::context::{BusLock, DynamicActorContext};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};
use verdant_common::actor::{Duty, DutyError};
use verdant_common::state::{Namespace, SharedState, Subtree};

const DEFAULT_SAMPLING_INTERVAL_S: f64 = 5.0;
const DEFAULT_DRIFT: f64 = 0.25;

pub struct SimulatedSensor {
    name: String,
    namespace: Namespace,
    bus: BusLock,
    simulate: bool,
    baselines: Vec<(String, f64)>,
    drift: f64,
    readings: HashMap<String, f64>,
}

impl SimulatedSensor {
    pub fn new(context: &DynamicActorContext) -> Self {
        let baselines = context
            .setting("variables")
            .and_then(Value::as_object)
            .map(|vars| {
                vars.iter()
                    .filter_map(|(key, value)| Some((key.clone(), value.as_f64()?)))
                    .collect()
            })
            .unwrap_or_default();
        let drift = context
            .setting("drift")
            .and_then(Value::as_f64)
            .filter(|d| (0.0..=1.0).contains(d))
            .unwrap_or(DEFAULT_DRIFT);

        Self {
            name: context.name().to_string(),
            namespace: context.namespace(),
            bus: context.bus.clone(),
            simulate: context.simulate,
            baselines,
            drift,
            readings: HashMap::new(),
        }
    }

    /// Current simulated value of `variable`.
    pub fn reading(&self, variable: &str) -> Option<f64> {
        self.readings.get(variable).copied()
    }

    fn interval_path(&self) -> Vec<&str> {
        let mut path = self.namespace.path("stored");
        path.push("sampling_interval_seconds");
        path
    }

    fn target(&self, state: &SharedState, variable: &str, baseline: f64) -> f64 {
        state
            .get_as::<f64>(Subtree::Environment, &["sensor", "desired", variable])
            .unwrap_or(baseline)
    }
}

impl Duty for SimulatedSensor {
    fn interval(&self, state: &SharedState) -> Duration {
        let seconds = state
            .get_as::<f64>(self.namespace.subtree, &self.interval_path())
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_SAMPLING_INTERVAL_S);
        Duration::from_secs_f64(seconds)
    }

    fn start(&mut self, state: &SharedState) -> Result<(), DutyError> {
        if self.baselines.is_empty() {
            return Err(DutyError::Config(format!(
                "{}: no numeric variables configured",
                self.name
            )));
        }
        if !self.simulate {
            warn!("{}: simulated sensor running outside simulation mode", self.name);
        }

        self.readings = self.baselines.iter().cloned().collect();
        let path = self.interval_path();
        if state.get(self.namespace.subtree, &path).is_none() {
            state.set(self.namespace.subtree, &path, DEFAULT_SAMPLING_INTERVAL_S);
        }
        info!(
            "🌡️  {}: simulating {} variable(s)",
            self.name,
            self.baselines.len()
        );
        Ok(())
    }

    async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
        let _bus = self.bus.lock();
        let mut last = Map::new();
        for (variable, baseline) in &self.baselines {
            let target = self.target(state, variable, *baseline);
            let current = self.readings.get(variable).copied().unwrap_or(*baseline);
            let next = ((current + (target - current) * self.drift) * 100.0).round() / 100.0;
            self.readings.insert(variable.clone(), next);

            state.report_sensor_value(&self.name, variable, json!(next), false);
            last.insert(variable.clone(), json!(next));
        }
        state.set(
            self.namespace.subtree,
            &self.namespace.path("last_reading"),
            Value::Object(last),
        );
        Ok(())
    }
}
