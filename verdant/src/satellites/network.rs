//! Connectivity probe.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};
use verdant_common::actor::{Duty, DutyError};
use verdant_common::state::{SharedState, Subtree};

/// Opens a TCP connection to a well-known endpoint to decide whether the
/// chamber is online.
pub struct NetworkDuty {
    address: String,
    timeout: Duration,
    interval: Duration,
    connected: Option<bool>,
}

impl NetworkDuty {
    pub fn new(address: String, timeout: Duration, interval: Duration) -> Self {
        Self {
            address,
            timeout,
            interval,
            connected: None,
        }
    }

    async fn probe(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(self.address.as_str())).await,
            Ok(Ok(_))
        )
    }
}

impl Duty for NetworkDuty {
    fn interval(&self, _state: &SharedState) -> Duration {
        self.interval
    }

    fn start(&mut self, state: &SharedState) -> Result<(), DutyError> {
        if !self.address.contains(':') {
            return Err(DutyError::Config(format!(
                "probe address '{}' must be host:port",
                self.address
            )));
        }
        self.connected = None;
        state.update(|tree| {
            tree.set(Subtree::Network, &["is_connected"], false.into());
            tree.set(Subtree::Network, &["status"], "Initializing".into());
        });
        Ok(())
    }

    async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
        let connected = self.probe().await;
        if self.connected != Some(connected) {
            if connected {
                info!("🌐 Connected to internet");
            } else {
                warn!("Disconnected from internet ({} unreachable)", self.address);
            }
            self.connected = Some(connected);
        }

        let status = if connected {
            "Connected".to_string()
        } else {
            format!("Unable to reach {}", self.address)
        };
        state.update(|tree| {
            tree.set(Subtree::Network, &["is_connected"], connected.into());
            tree.set(Subtree::Network, &["status"], status.into());
        });
        Ok(())
    }
}
