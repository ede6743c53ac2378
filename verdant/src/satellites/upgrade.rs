//! Software version reporting.
//!
//! Upgrades themselves are delivered out of band; this satellite only
//! publishes what is running.

use std::time::Duration;
use verdant_common::actor::{Duty, DutyError};
use verdant_common::state::{SharedState, Subtree};

pub struct UpgradeDuty {
    interval: Duration,
}

impl UpgradeDuty {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn current_version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

impl Duty for UpgradeDuty {
    fn interval(&self, _state: &SharedState) -> Duration {
        self.interval
    }

    fn start(&mut self, state: &SharedState) -> Result<(), DutyError> {
        state.set(Subtree::Upgrade, &["current_version"], Self::current_version());
        Ok(())
    }

    async fn poll(&mut self, state: &SharedState) -> Result<(), DutyError> {
        let version = Self::current_version();
        state.update(|tree| {
            tree.set(Subtree::Upgrade, &["current_version"], version.into());
            tree.set(Subtree::Upgrade, &["upgrade_version"], version.into());
            tree.set(Subtree::Upgrade, &["show_upgrade"], false.into());
            tree.set(Subtree::Upgrade, &["status"], "Up to date".into());
        });
        Ok(())
    }
}
