//! Events accepted by the recipe engine.
//!
//! Requests are validated by the ingestion gateway before they are queued.

/// A queued recipe request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeEvent {
    /// Start (or resume) a recipe, optionally at a future Unix timestamp in seconds.
    Start {
        uuid: String,
        start_timestamp: Option<f64>,
    },
    Stop,
    Pause,
}

impl RecipeEvent {
    pub fn start(uuid: impl Into<String>) -> Self {
        RecipeEvent::Start {
            uuid: uuid.into(),
            start_timestamp: None,
        }
    }

    pub fn start_at(uuid: impl Into<String>, timestamp: f64) -> Self {
        RecipeEvent::Start {
            uuid: uuid.into(),
            start_timestamp: Some(timestamp),
        }
    }
}
