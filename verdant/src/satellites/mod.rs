//! Housekeeping satellites.
//!
//! Four [`PeriodicActor`]s started on the first `SETUP` and torn down on
//! reset: connectivity probing, telemetry publishing, disk monitoring and
//! version reporting. Each mirrors its state into its own sub-tree.

mod iot;
mod network;
mod resource;
mod upgrade;

pub use iot::{IotDuty, LogSink, TelemetryError, TelemetrySink};
pub use network::NetworkDuty;
pub use resource::{DiskUsage, ResourceDuty, disk_usage, format_bytes};
pub use upgrade::UpgradeDuty;

use std::sync::Arc;
use std::time::Duration;
use verdant_common::actor::{Actor, ManagedActor, PeriodicActor};
use verdant_common::config::VerdantConfig;
use verdant_common::state::{Namespace, SharedState, Subtree};

/// Build the four satellites, unspawned, reporting through `sink`.
pub fn build(
    config: &VerdantConfig,
    state: &Arc<SharedState>,
    sink: Arc<dyn TelemetrySink>,
) -> Vec<Box<dyn ManagedActor>> {
    let tick = config.timing.tick();
    let satellites = &config.satellites;
    vec![
        periodic(
            Subtree::Network,
            state,
            tick,
            NetworkDuty::new(
                satellites.probe_address.clone(),
                satellites.probe_timeout(),
                Duration::from_secs(satellites.network_interval_s),
            ),
        ),
        periodic(
            Subtree::Iot,
            state,
            tick,
            IotDuty::new(sink, Duration::from_secs(satellites.iot_interval_s)),
        ),
        periodic(
            Subtree::Resource,
            state,
            tick,
            ResourceDuty::new(
                config.storage.data_dir.clone(),
                Duration::from_secs(satellites.resource_interval_s),
            ),
        ),
        periodic(
            Subtree::Upgrade,
            state,
            tick,
            UpgradeDuty::new(Duration::from_secs(satellites.upgrade_interval_s)),
        ),
    ]
}

fn periodic<D: verdant_common::actor::Duty>(
    subtree: Subtree,
    state: &Arc<SharedState>,
    tick: Duration,
    duty: D,
) -> Box<dyn ManagedActor> {
    Box::new(Actor::new(PeriodicActor::new(
        subtree.as_str(),
        Namespace::root(subtree),
        Arc::clone(state),
        tick,
        duty,
    )))
}
