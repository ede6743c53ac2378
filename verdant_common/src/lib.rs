//! Verdant Common Library
//!
//! Shared building blocks for the chamber controller: the process-wide state
//! document, the state-machine actor framework, the persistence store and
//! configuration loading.
//!
//! # Module Structure
//!
//! - [`state`] - Shared state store and sensor merge policy
//! - [`actor`] - Modes, inboxes, run loops and actor handles
//! - [`store`] - Persistence trait, file and memory stores, schema checks
//! - [`documents`] - Recipe, device configuration and setup documents
//! - [`clock`] - Wall-clock abstraction
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Defaults and well-known names
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use verdant_common::prelude::*;
//!
//! let state = SharedState::new();
//! state.set(Subtree::Device, &["mode"], "INIT");
//! ```

pub mod actor;
pub mod clock;
pub mod config;
pub mod consts;
pub mod documents;
pub mod prelude;
pub mod state;
pub mod store;
