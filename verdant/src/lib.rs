//! # Verdant
//!
//! Supervisory core of the chamber controller. The [`Coordinator`] boots
//! the process, owns the recipe engine, the housekeeping satellites and the
//! configured device actors, and reconfigures them on request. The
//! [`EventGateway`] validates outside requests before queueing them.
//!
//! # Module Structure
//!
//! - [`coordinator`] - Boot sequence and reconfiguration
//! - [`modes`] - Coordinator modes and transition table
//! - [`events`] - Queued coordinator requests
//! - [`gateway`] - Request validation and responses
//! - [`satellites`] - Network, telemetry, storage and version actors

pub mod coordinator;
pub mod events;
pub mod gateway;
pub mod modes;
pub mod satellites;

pub use coordinator::Coordinator;
pub use events::CoordinatorEvent;
pub use gateway::{EventGateway, Response};
pub use modes::CoordinatorMode;
