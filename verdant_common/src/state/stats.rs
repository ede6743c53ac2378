//! Sensor merge policy.
//!
//! Several physical sensors may report the same logical variable (two air
//! temperature probes, say). Each report lands in
//! `environment.reported_sensor_stats` and the consensus value is written to
//! `environment.sensor.reported[variable]`:
//!
//! ```text
//! reported_sensor_stats
//! ├── individual
//! │   ├── instantaneous[variable][sensor] = value
//! │   └── average[sensor]                 = {value, samples}
//! └── group
//!     ├── instantaneous[variable]         = {value, samples}
//!     └── average[variable]               = {value, samples}
//! ```

use super::descend;
use serde_json::{Map, Value, json};

/// Running mean with its sample count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub samples: u64,
}

impl Sample {
    fn read(slot: Option<&Value>) -> Option<Self> {
        let slot = slot?;
        Some(Self {
            value: slot.get("value")?.as_f64()?,
            samples: slot.get("samples")?.as_u64()?,
        })
    }

    fn to_value(self) -> Value {
        json!({ "value": self.value, "samples": self.samples })
    }

    /// Fold `reading` into the mean.
    fn accumulate(previous: Option<Self>, reading: f64) -> Self {
        match previous {
            Some(prev) => {
                let samples = prev.samples + 1;
                Self {
                    value: (prev.value * prev.samples as f64 + reading) / samples as f64,
                    samples,
                }
            }
            None => Self {
                value: reading,
                samples: 1,
            },
        }
    }

    /// Fold `reading` into the mean, reseeding once the window overflows.
    fn accumulate_windowed(previous: Option<Self>, reading: f64, window: u64) -> Self {
        match previous {
            Some(prev) if prev.samples + 1 > window => Self {
                value: reading,
                samples: 1,
            },
            other => Self::accumulate(other, reading),
        }
    }
}

/// Merge one reading into `environment`.
///
/// Null and non-numeric readings are stored verbatim and bypass averaging,
/// as does any reading flagged `simple`.
pub fn record_sensor_value(
    environment: &mut Map<String, Value>,
    sensor: &str,
    variable: &str,
    value: Value,
    simple: bool,
    window: u64,
) {
    let reading = if simple { None } else { value.as_f64() };

    let stats = descend(environment, &["reported_sensor_stats"]);
    descend(stats, &["individual", "instantaneous", variable])
        .insert(sensor.to_string(), value.clone());

    let Some(reading) = reading else {
        descend(environment, &["sensor", "reported"]).insert(variable.to_string(), value);
        return;
    };

    let individual = descend(stats, &["individual", "average"]);
    let mean = Sample::accumulate(Sample::read(individual.get(sensor)), reading);
    individual.insert(sensor.to_string(), mean.to_value());

    let group = group_instantaneous(stats, variable);
    descend(stats, &["group", "instantaneous"]).insert(variable.to_string(), group.to_value());

    let averages = descend(stats, &["group", "average"]);
    let average = Sample::accumulate_windowed(Sample::read(averages.get(variable)), group.value, window);
    averages.insert(variable.to_string(), average.to_value());

    descend(environment, &["sensor", "reported"]).insert(variable.to_string(), json!(group.value));
}

/// Mean over every sensor currently holding a numeric value for `variable`.
fn group_instantaneous(stats: &mut Map<String, Value>, variable: &str) -> Sample {
    let readings = descend(stats, &["individual", "instantaneous", variable]);
    let (sum, count) = readings
        .values()
        .filter_map(Value::as_f64)
        .fold((0.0, 0u64), |(sum, count), v| (sum + v, count + 1));
    Sample {
        value: if count == 0 { 0.0 } else { sum / count as f64 },
        samples: count,
    }
}
