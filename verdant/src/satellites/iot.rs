//! Telemetry publisher.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use verdant_common::actor::{Duty, DutyError};
use verdant_common::state::{SharedState, Subtree};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry link unavailable: {0}")]
    Unavailable(String),

    #[error("Telemetry rejected: {0}")]
    Rejected(String),
}

/// Outbound telemetry transport.
pub trait TelemetrySink: Send + Sync {
    fn is_connected(&self) -> bool {
        true
    }

    /// Publish the variables that changed since the last successful call.
    fn publish(&self, values: &Map<String, Value>) -> Result<(), TelemetryError>;
}

/// Sink that only logs. Used when no cloud link is configured.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&self, values: &Map<String, Value>) -> Result<(), TelemetryError> {
        for (variable, value) in values {
            debug!("telemetry {} = {}", variable, value);
        }
        Ok(())
    }
}

/// Publishes changed `environment.sensor.reported` values.
pub struct IotDuty {
    sink: Arc<dyn TelemetrySink>,
    interval: Duration,
    last_sent: Map<String, Value>,
}

impl IotDuty {
    pub fn new(sink: Arc<dyn TelemetrySink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            last_sent: Map::new(),
        }
    }

    fn changed(&self, reported: Map<String, Value>) -> Map<String, Value> {
        reported
            .into_iter()
            .filter(|(variable, value)| self.last_sent.get(variable) != Some(value))
            .collect()
    }

    fn mirror(state: &SharedState, connected: bool, status: String) {
        state.update(|tree| {
            tree.set(Subtree::Iot, &["is_connected"], connected.into());
            tree.set(Subtree::Iot, &["status"], status.into());
        });
    }
}

impl Duty for IotDuty {
    fn interval(&self, _state: &SharedState) -> Duration {
        self.interval
    }

    fn start(&mut self, state: &SharedState) -> Result<(), DutyError> {
        self.last_sent.clear();
        Self::mirror(state, self.sink.is_connected(), "Initializing".into());
        Ok(())
    }

    async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
        if !self.sink.is_connected() {
            Self::mirror(state, false, "Not connected".into());
            return Ok(());
        }

        let reported = state
            .get(Subtree::Environment, &["sensor", "reported"])
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_default();
        let changed = self.changed(reported);
        if changed.is_empty() {
            Self::mirror(state, true, "No new values".into());
            return Ok(());
        }

        match self.sink.publish(&changed) {
            Ok(()) => {
                let count = changed.len();
                info!("📡 Published {} telemetry value(s)", count);
                self.last_sent.extend(changed);
                Self::mirror(state, true, format!("Published {count} value(s)"));
                state.set(Subtree::Iot, &["last_publish"], Utc::now().to_rfc3339());
            }
            Err(e) => {
                warn!("{}", e);
                Self::mirror(state, false, e.to_string());
            }
        }
        Ok(())
    }
}
