//! # Verdant Recipe
//!
//! Compiles declarative recipes into per-minute transition tables and plays
//! them back against wall-clock time, writing desired setpoints into the
//! shared state.
//!
//! # Module Structure
//!
//! - [`parser`] - Recipe document → transition table
//! - [`schedule`] - Compiled table with floor lookup
//! - [`engine`] - The playback actor
//! - [`progress`] - Progress and setpoint fields in shared state
//! - [`modes`] - Engine modes and transition table
//! - [`events`] - Queued requests

pub mod engine;
pub mod events;
pub mod modes;
pub mod parser;
pub mod progress;
pub mod schedule;

pub use engine::{RecipeEngine, RecipeError};
pub use events::RecipeEvent;
pub use modes::RecipeMode;
pub use parser::{ParseError, parse};
pub use schedule::Schedule;
