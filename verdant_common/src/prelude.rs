//! Prelude module for common re-exports.
//!
//! ```rust
//! use verdant_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, LogLevel, SatelliteConfig, SharedConfig, VerdantConfig,
};

// ─── Shared State ───────────────────────────────────────────────────
pub use crate::state::{Namespace, SharedState, StateTree, Subtree};

// ─── Actors ─────────────────────────────────────────────────────────
pub use crate::actor::{
    Actor, ActorCore, ActorError, ActorMode, Duty, DutyError, EventSender, LifecycleMode,
    ManagedActor, PeriodicActor, StateMachine,
};

// ─── Persistence ────────────────────────────────────────────────────
pub use crate::documents::{
    ActorConfig, DeviceConfig, EnvironmentRecord, RecipeDocument, RecipeTransition,
    SetupDescriptor,
};
pub use crate::store::{FileStore, MemoryStore, Store, StoreError};

// ─── Time ───────────────────────────────────────────────────────────
pub use crate::clock::{Clock, ManualClock, SystemClock};
