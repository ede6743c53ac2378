//! # Verdant Devices
//!
//! Peripherals and controllers instantiated from the active device
//! configuration. Each entry's setup names a `module.class` key; the
//! [`ActorRegistry`] maps that key to a factory that builds an unspawned
//! [`ManagedActor`](verdant_common::actor::ManagedActor).
//!
//! # Module Structure
//!
//! - [`registry`] - Factory registration and lookup
//! - [`context`] - Construction context and the shared bus lock
//! - [`simulation`] - Simulated sensor and setpoint relay
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  setup.factory_key()  ┌────────────────┐
//! │  Coordinator  │──────────────────────►│ ActorRegistry  │
//! │   (SETUP)     │◄──────────────────────│  module.class  │
//! └──────┬────────┘  Box<dyn ManagedActor>└────────────────┘
//!        │ spawn
//!        ▼
//! ┌─────────────────────────────┐
//! │ PeriodicActor<impl Duty>    │── BusLock ──► hardware
//! │ peripherals.<name>          │
//! │ controllers.<name>          │
//! └─────────────────────────────┘
//! ```

pub mod context;
pub mod registry;
pub mod simulation;

pub use context::{ActorKind, BusLock, DynamicActorContext};
pub use registry::{ActorFactory, ActorRegistry, RegistryError};
