//! # Recipe Engine Tests
//!
//! Drives a spawned engine with a manual clock and an in-memory store.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use verdant_common::actor::{Actor, ManagedActor};
use verdant_common::clock::{Clock, ManualClock};
use verdant_common::documents::RecipeDocument;
use verdant_common::state::{SharedState, Subtree};
use verdant_common::store::{MemoryStore, Store};
use verdant_recipe::{RecipeEngine, RecipeEvent, Schedule};

// ─── Helpers ────────────────────────────────────────────────────────

const START_MINUTE: i64 = 29_000_000;

fn basil() -> RecipeDocument {
    serde_json::from_value(json!({
        "name": "Basil",
        "uuid": "r-basil",
        "environments": {
            "day": { "name": "Day", "air_temperature_celsius": 24, "light_on": true },
            "night": { "name": "Night", "air_temperature_celsius": 18, "light_on": false }
        },
        "phases": [{ "name": "Grow", "repeat": 1, "cycles": [
            { "name": "Day", "environment": "day", "duration_minutes": 60 },
            { "name": "Night", "environment": "night", "duration_minutes": 30 }
        ]}]
    }))
    .unwrap()
}

struct Rig {
    state: Arc<SharedState>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    actor: Actor<RecipeEngine>,
}

impl Rig {
    fn new() -> Self {
        Self::with(SharedState::new(), MemoryStore::new().with_recipe(basil()))
    }

    fn with(state: SharedState, store: MemoryStore) -> Self {
        let state = Arc::new(state);
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::at_minute(START_MINUTE));
        let engine = RecipeEngine::new(
            Arc::clone(&state),
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Duration::from_millis(5),
        );
        let mut actor = Actor::new(engine);
        actor.spawn().unwrap();
        Self {
            state,
            store,
            clock,
            actor,
        }
    }

    fn send(&self, event: RecipeEvent) {
        self.actor.sender().send(event).unwrap();
    }

    fn mode(&self) -> Option<Value> {
        self.state.get(Subtree::Recipe, &["mode"])
    }

    async fn wait_for_mode(&self, mode: &str) {
        for _ in 0..400 {
            if self.mode() == Some(json!(mode)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("recipe never reached {mode}, stuck in {:?}", self.mode());
    }

    fn desired(&self, variable: &str) -> Option<Value> {
        self.state
            .get(Subtree::Environment, &["sensor", "desired", variable])
    }

    async fn wait_for_desired(&self, variable: &str, value: Value) {
        for _ in 0..400 {
            if self.desired(variable) == Some(value.clone()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{variable} never became {value}, is {:?}", self.desired(variable));
    }

    async fn stop(mut self) {
        self.actor.shutdown();
        self.actor.join().await;
        assert!(self.actor.is_terminated());
    }
}

// ─── Lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn boots_into_norecipe() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;
    rig.stop().await;
}

#[tokio::test]
async fn start_now_plays_first_environment() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;

    rig.send(RecipeEvent::start("r-basil"));
    rig.wait_for_mode("NORMAL").await;
    rig.wait_for_desired("air_temperature_celsius", json!(24)).await;

    assert_eq!(
        rig.state.get(Subtree::Recipe, &["current_environment_name"]),
        Some(json!("Day"))
    );
    assert_eq!(
        rig.state.get(Subtree::Recipe, &["duration_minutes"]),
        Some(json!(90))
    );
    assert_eq!(rig.store.load_recipe_transitions().unwrap().len(), 3);
    rig.stop().await;
}

#[tokio::test]
async fn playback_follows_the_clock() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;
    rig.send(RecipeEvent::start("r-basil"));
    rig.wait_for_desired("air_temperature_celsius", json!(24)).await;

    rig.clock.advance_minutes(61);
    rig.wait_for_desired("air_temperature_celsius", json!(18)).await;
    assert_eq!(rig.desired("light_on"), Some(json!(false)));
    assert_eq!(
        rig.state.get(Subtree::Recipe, &["current_cycle"]),
        Some(json!("Night"))
    );
    rig.stop().await;
}

#[tokio::test]
async fn reaching_end_stops_and_clears_setpoints() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;
    rig.send(RecipeEvent::start("r-basil"));
    rig.wait_for_desired("air_temperature_celsius", json!(24)).await;

    rig.clock.advance_minutes(90);
    rig.wait_for_desired("air_temperature_celsius", Value::Null).await;
    rig.wait_for_mode("NORECIPE").await;

    assert_eq!(rig.desired("light_on"), Some(Value::Null));
    assert_eq!(
        rig.state.get(Subtree::Recipe, &["recipe_uuid"]),
        Some(Value::Null)
    );
    rig.stop().await;
}

#[tokio::test]
async fn future_start_waits_in_queued() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;

    let start_seconds = ((START_MINUTE + 120) * 60) as f64 + 30.0;
    rig.send(RecipeEvent::start_at("r-basil", start_seconds));
    rig.wait_for_mode("QUEUED").await;
    assert_eq!(
        rig.state.get(Subtree::Recipe, &["start_timestamp_minutes"]),
        Some(json!(START_MINUTE + 120))
    );

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(rig.mode(), Some(json!("QUEUED")));
    assert_eq!(rig.desired("air_temperature_celsius"), None);

    rig.clock.advance_minutes(120);
    rig.wait_for_mode("NORMAL").await;
    rig.wait_for_desired("air_temperature_celsius", json!(24)).await;
    rig.stop().await;
}

#[tokio::test]
async fn stop_while_queued_returns_to_norecipe() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;
    rig.send(RecipeEvent::start_at(
        "r-basil",
        ((START_MINUTE + 600) * 60) as f64,
    ));
    rig.wait_for_mode("QUEUED").await;

    rig.send(RecipeEvent::Stop);
    rig.wait_for_mode("NORECIPE").await;
    assert_eq!(
        rig.state.get(Subtree::Recipe, &["start_timestamp_minutes"]),
        Some(Value::Null)
    );
    rig.stop().await;
}

#[tokio::test]
async fn pause_clears_setpoints_and_start_resumes() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;
    rig.send(RecipeEvent::start("r-basil"));
    rig.wait_for_desired("air_temperature_celsius", json!(24)).await;

    rig.send(RecipeEvent::Pause);
    rig.wait_for_mode("PAUSE").await;
    rig.wait_for_desired("air_temperature_celsius", Value::Null).await;

    rig.send(RecipeEvent::start("r-basil"));
    rig.wait_for_mode("NORMAL").await;
    rig.wait_for_desired("air_temperature_celsius", json!(24)).await;
    rig.stop().await;
}

#[tokio::test]
async fn unknown_recipe_falls_back_to_norecipe() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;

    rig.send(RecipeEvent::start("r-missing"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    rig.wait_for_mode("NORECIPE").await;
    assert!(rig.store.load_recipe_transitions().unwrap().is_empty());
    rig.stop().await;
}

#[tokio::test]
async fn malformed_recipe_falls_back_to_norecipe() {
    let mut broken = basil();
    broken.uuid = "r-broken".into();
    broken.phases[0].cycles[0].duration_minutes = None;
    let rig = Rig::with(
        SharedState::new(),
        MemoryStore::new().with_recipe(broken),
    );
    rig.wait_for_mode("NORECIPE").await;

    rig.send(RecipeEvent::start("r-broken"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    rig.wait_for_mode("NORECIPE").await;
    rig.stop().await;
}

#[tokio::test]
async fn oversized_recipe_is_rejected_without_killing_the_engine() {
    let mut eternal = basil();
    eternal.uuid = "r-eternal".into();
    eternal.phases[0].repeat = 4;
    eternal.phases[0].cycles[0].duration_hours = Some(1e17);
    let rig = Rig::with(SharedState::new(), MemoryStore::new().with_recipe(eternal));
    rig.wait_for_mode("NORECIPE").await;

    rig.send(RecipeEvent::start("r-eternal"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    rig.wait_for_mode("NORECIPE").await;
    assert!(!rig.actor.is_terminated());
    assert!(rig.store.load_recipe_transitions().unwrap().is_empty());
    rig.stop().await;
}

// ─── Resume ─────────────────────────────────────────────────────────

#[tokio::test]
async fn resumes_stored_normal_mode() {
    let schedule = Schedule::compile(&basil()).unwrap();
    let store = MemoryStore::new().with_recipe(basil());
    store.save_recipe_transitions(schedule.transitions()).unwrap();

    let state = SharedState::new();
    state.set(Subtree::Recipe, &["stored_mode"], "NORMAL");
    state.set(Subtree::Recipe, &["start_timestamp_minutes"], START_MINUTE - 70);
    state.set(Subtree::Recipe, &["last_update_minute"], 10);

    let rig = Rig::with(state, store);
    rig.wait_for_mode("NORMAL").await;
    rig.wait_for_desired("air_temperature_celsius", json!(18)).await;
    assert_eq!(
        rig.state.get(Subtree::Recipe, &["stored_mode"]),
        Some(Value::Null)
    );
    rig.stop().await;
}

#[tokio::test]
async fn stored_mode_without_transitions_is_dropped() {
    let state = SharedState::new();
    state.set(Subtree::Recipe, &["stored_mode"], "NORMAL");
    state.set(Subtree::Recipe, &["start_timestamp_minutes"], START_MINUTE);

    let rig = Rig::with(state, MemoryStore::new());
    rig.wait_for_mode("NORECIPE").await;
    rig.stop().await;
}

#[tokio::test]
async fn reset_is_ignored_outside_error() {
    let rig = Rig::new();
    rig.wait_for_mode("NORECIPE").await;

    rig.actor.reset();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(rig.mode(), Some(json!("NORECIPE")));

    rig.send(RecipeEvent::start("r-basil"));
    rig.wait_for_mode("NORMAL").await;
    rig.stop().await;
}
