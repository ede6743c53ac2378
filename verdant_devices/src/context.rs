//! Construction context handed to every dynamic actor factory.

use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use verdant_common::documents::{ActorConfig, SetupDescriptor};
use verdant_common::state::{Namespace, SharedState, Subtree};

/// Which side of the device config an actor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Peripheral,
    Controller,
}

impl ActorKind {
    /// Sub-tree holding this kind's namespaces.
    pub fn subtree(self) -> Subtree {
        match self {
            Self::Peripheral => Subtree::Peripherals,
            Self::Controller => Subtree::Controllers,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Peripheral => "peripheral",
            Self::Controller => "controller",
        }
    }
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exclusive access to the shared hardware bus.
///
/// One instance is created per coordinator and cloned into every dynamic
/// actor. Guards must be dropped before the next `.await`.
#[derive(Debug, Clone, Default)]
pub struct BusLock(Arc<Mutex<()>>);

impl BusLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock()
    }

    /// True when both handles guard the same bus.
    pub fn same_bus(&self, other: &BusLock) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Everything a factory needs to build one peripheral or controller.
#[derive(Debug, Clone)]
pub struct DynamicActorContext {
    pub kind: ActorKind,
    pub config: ActorConfig,
    pub setup: SetupDescriptor,
    pub state: Arc<SharedState>,
    pub bus: BusLock,
    pub simulate: bool,
    pub tick: Duration,
}

impl DynamicActorContext {
    /// Actor name, taken from the device config entry.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// `peripherals.<name>` or `controllers.<name>`.
    pub fn namespace(&self) -> Namespace {
        Namespace::keyed(self.kind.subtree(), self.config.name.clone())
    }

    /// Look a key up in the config parameters first, then the setup properties.
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.config
            .parameters
            .get(key)
            .or_else(|| self.setup.properties.get(key))
    }
}
