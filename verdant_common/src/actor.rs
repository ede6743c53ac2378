//! Cooperative state-machine actors.
//!
//! An actor is a long-lived tokio task that owns a mode, a static transition
//! table and an inbox. Each mode handler loops on [`ActorCore::idle`] (inbox
//! or tick, whichever comes first) and leaves once
//! [`ActorCore::request_transition`] says so.
//!
//! # Module Structure
//!
//! - [`mode`] - Mode sets and transition tables
//! - [`queue`] - Inbox and [`EventSender`]
//! - [`machine`] - [`ActorCore`], the [`StateMachine`] trait and the run loop
//! - [`handle`] - [`ManagedActor`], the object-safe surface used by supervisors
//! - [`periodic`] - Generic lifecycle actor driven by a [`Duty`]

pub mod handle;
pub mod machine;
pub mod mode;
pub mod periodic;
pub mod queue;

pub use handle::{Actor, ManagedActor};
pub use machine::{ActorCore, StateMachine, run};
pub use mode::{ActorMode, LifecycleMode, parse_mode, valid_transition};
pub use periodic::{Duty, DutyError, PeriodicActor};
pub use queue::{Control, EventSender};

use thiserror::Error;

/// Errors surfaced to code that drives actors from outside.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The owning loop has exited and dropped its inbox.
    #[error("Actor '{0}' is no longer accepting events")]
    QueueClosed(String),

    #[error("Actor '{0}' has already been spawned")]
    AlreadySpawned(String),

    #[error("Actor '{0}' cannot be spawned outside a tokio runtime")]
    NoRuntime(String),
}
