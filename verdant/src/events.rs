//! Events accepted by the coordinator.

/// A queued coordinator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Switch to the named device configuration.
    LoadConfig { name: String },
}
