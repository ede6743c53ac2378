//! Event ingestion.
//!
//! Requests from the outer surface are validated against the mirrored modes
//! before anything is queued, so a rejected request never reaches an actor.
//! Every call returns a [`Response`] with an HTTP-style status.

use crate::events::CoordinatorEvent;
use crate::modes::CoordinatorMode;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use verdant_common::actor::{ActorMode, EventSender, parse_mode, valid_transition};
use verdant_common::clock::Clock;
use verdant_common::state::{SharedState, Subtree};
use verdant_common::store::Store;
use verdant_recipe::{RecipeEvent, RecipeMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub message: String,
    pub status: u16,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 200,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 400,
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: 503,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Validating front-end to the coordinator and recipe engine inboxes.
#[derive(Clone)]
pub struct EventGateway {
    state: Arc<SharedState>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    coordinator: EventSender<CoordinatorEvent>,
    recipe: EventSender<RecipeEvent>,
}

impl EventGateway {
    pub fn new(
        state: Arc<SharedState>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        coordinator: EventSender<CoordinatorEvent>,
        recipe: EventSender<RecipeEvent>,
    ) -> Self {
        Self {
            state,
            store,
            clock,
            coordinator,
            recipe,
        }
    }

    /// Dispatch a `{"type": ...}` request body to `target`.
    ///
    /// `device` (or `coordinator`) accepts `Reset`, `Shutdown` and
    /// `Load Config`; `recipe` accepts `Reset`, `Shutdown`, `Start`, `Stop`
    /// and `Pause`.
    /// Recipe uploads (`Load Recipe`) are not taken here and answer as an
    /// unknown request type.
    pub fn create_event(&self, target: &str, body: &Value) -> Response {
        let request = body.get("type").and_then(Value::as_str);
        match target {
            "device" | "coordinator" => match request {
                Some("Reset") => {
                    self.reset::<CoordinatorMode, _>(Subtree::Device, &self.coordinator)
                }
                Some("Shutdown") => Self::shutdown(&self.coordinator),
                Some("Load Config") => {
                    self.load_device_config(body.get("uuid").and_then(Value::as_str))
                }
                _ => Response::bad_request("Unknown event request type"),
            },
            "recipe" => match request {
                Some("Reset") => self.reset::<RecipeMode, _>(Subtree::Recipe, &self.recipe),
                Some("Shutdown") => Self::shutdown(&self.recipe),
                Some("Start") => self.start_recipe(
                    body.get("uuid").and_then(Value::as_str),
                    body.get("start_timestamp").and_then(Value::as_f64),
                ),
                Some("Stop") => self.stop_recipe(),
                Some("Pause") => self.pause_recipe(),
                _ => Response::bad_request("Unknown event request type"),
            },
            _ => Response::bad_request("Unknown event target"),
        }
    }

    /// Queue a recipe start. `start_timestamp` is Unix seconds.
    pub fn start_recipe(&self, uuid: Option<&str>, start_timestamp: Option<f64>) -> Response {
        let Some(uuid) = uuid.filter(|uuid| !uuid.is_empty()) else {
            return Response::bad_request("Unable to start recipe, did not receive uuid");
        };
        if !self.store.recipe_exists(uuid) {
            return Response::bad_request("Unable to start recipe, invalid uuid");
        }
        if let Some(timestamp) = start_timestamp {
            let now = self.clock.now().timestamp_millis() as f64 / 1000.0;
            if timestamp <= now {
                return Response::bad_request(
                    "Unable to start recipe, timestamp must be in the future",
                );
            }
        }
        let mode = self.recipe_mode();
        if !matches!(mode.as_str(), "NORECIPE" | "PAUSE") {
            return Response::bad_request(format!(
                "Unable to start recipe, recipe is currently in {mode} mode"
            ));
        }

        let event = RecipeEvent::Start {
            uuid: uuid.to_string(),
            start_timestamp,
        };
        match self.recipe.send(event) {
            Ok(()) => {
                info!("Queued start of recipe {}", uuid);
                Response::ok(
                    "Queued start recipe event, this may take a few moments depending on the recipe size",
                )
            }
            Err(e) => {
                warn!("{}", e);
                Response::unavailable("Unable to start recipe, event queue is unavailable")
            }
        }
    }

    pub fn stop_recipe(&self) -> Response {
        let mode = self.recipe_mode();
        if !matches!(mode.as_str(), "NORMAL" | "QUEUED") {
            return Response::bad_request(format!(
                "Unable to stop recipe, recipe is currently in {mode} mode"
            ));
        }
        match self.recipe.send(RecipeEvent::Stop) {
            Ok(()) => Response::ok("Queued stop recipe event"),
            Err(e) => {
                warn!("{}", e);
                Response::unavailable("Unable to stop recipe, event queue is unavailable")
            }
        }
    }

    pub fn pause_recipe(&self) -> Response {
        let mode = self.recipe_mode();
        if mode != "NORMAL" {
            return Response::bad_request(format!(
                "Unable to pause recipe, recipe is currently in {mode} mode"
            ));
        }
        match self.recipe.send(RecipeEvent::Pause) {
            Ok(()) => Response::ok("Queued pause recipe event"),
            Err(e) => {
                warn!("{}", e);
                Response::unavailable("Unable to pause recipe, event queue is unavailable")
            }
        }
    }

    /// Switch to the device configuration with the given uuid.
    pub fn load_device_config(&self, uuid: Option<&str>) -> Response {
        let Some(uuid) = uuid.filter(|uuid| !uuid.is_empty()) else {
            return Response::bad_request("Unable to load config, did not receive uuid");
        };
        let Some(name) = self.store.device_config_name(uuid) else {
            return Response::bad_request("Invalid config uuid, corresponding filepath not found");
        };
        let message = format!("Loading config: {name}");
        match self.coordinator.send(CoordinatorEvent::LoadConfig { name }) {
            Ok(()) => Response::ok(message),
            Err(e) => {
                warn!("{}", e);
                Response::unavailable("Unable to load config, event queue is unavailable")
            }
        }
    }

    fn recipe_mode(&self) -> String {
        self.state
            .get_as::<String>(Subtree::Recipe, &["mode"])
            .unwrap_or_default()
    }

    fn reset<M: ActorMode, E>(
        &self,
        subtree: Subtree,
        sender: &EventSender<E>,
    ) -> Response {
        let name = self
            .state
            .get_as::<String>(subtree, &["mode"])
            .unwrap_or_default();
        match parse_mode::<M>(&name) {
            Some(mode) if valid_transition(mode, M::RESET) => match sender.reset() {
                Ok(()) => Response::ok("Resetting"),
                Err(e) => {
                    warn!("{}", e);
                    Response::unavailable("Unable to reset, event queue is unavailable")
                }
            },
            _ => Response::bad_request(format!("Unable to reset from {name} mode")),
        }
    }

    fn shutdown<E>(sender: &EventSender<E>) -> Response {
        match sender.shutdown() {
            Ok(()) => Response::ok("Shutting down"),
            Err(e) => {
                warn!("{}", e);
                Response::unavailable("Unable to shut down, event queue is unavailable")
            }
        }
    }
}
