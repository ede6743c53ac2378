//! Recipe progress fields in `recipe.*` and desired setpoints in
//! `environment.sensor.desired.*`.

use serde_json::{Value, json};
use verdant_common::clock::format_minutes;
use verdant_common::documents::RecipeTransition;
use verdant_common::state::{SharedState, StateTree, Subtree};

/// Every progress field written by the engine.
pub const PROGRESS_FIELDS: [&str; 16] = [
    "recipe_uuid",
    "recipe_name",
    "duration_minutes",
    "duration_string",
    "start_timestamp_minutes",
    "start_datestring",
    "last_update_minute",
    "percent_complete",
    "percent_complete_string",
    "time_remaining_minutes",
    "time_remaining_string",
    "time_elapsed_string",
    "current_phase",
    "current_cycle",
    "current_environment_name",
    "current_environment_state",
];

const DESIRED: [&str; 2] = ["sensor", "desired"];

/// `"{d} Days {h} Hours {m} Minutes"`.
pub fn duration_string(minutes: u64) -> String {
    let days = minutes / (24 * 60);
    let hours = (minutes % (24 * 60)) / 60;
    let mins = minutes % 60;
    format!("{days} Days {hours} Hours {mins} Minutes")
}

/// Record a freshly started recipe.
pub fn record_start(
    state: &SharedState,
    uuid: &str,
    name: &str,
    duration_minutes: u64,
    start_minutes: i64,
) {
    state.update(|tree| {
        let mut set = |field: &str, value: Value| tree.set(Subtree::Recipe, &[field], value);
        set("recipe_uuid", json!(uuid));
        set("recipe_name", json!(name));
        set("duration_minutes", json!(duration_minutes));
        set("duration_string", json!(duration_string(duration_minutes)));
        set("start_timestamp_minutes", json!(start_minutes));
        set("start_datestring", json!(format_minutes(start_minutes)));
        set("last_update_minute", json!(-1));
    });
}

/// Record playback at `elapsed` minutes and push the environment state
/// into the desired setpoints, all under one lock.
pub fn record_playback(
    state: &SharedState,
    elapsed: i64,
    duration_minutes: u64,
    transition: &RecipeTransition,
) {
    let limit = i64::try_from(duration_minutes).unwrap_or(i64::MAX);
    let elapsed_clamped = elapsed.clamp(0, limit) as u64;
    let remaining = duration_minutes - elapsed_clamped;
    let percent = if duration_minutes == 0 {
        100.0
    } else {
        elapsed_clamped as f64 * 100.0 / duration_minutes as f64
    };

    state.update(|tree| {
        {
            let mut set = |field: &str, value: Value| tree.set(Subtree::Recipe, &[field], value);
            set("last_update_minute", json!(elapsed));
            set("percent_complete", json!(percent));
            set("percent_complete_string", json!(format!("{percent:.2} %")));
            set("time_remaining_minutes", json!(remaining));
            set("time_remaining_string", json!(duration_string(remaining)));
            set("time_elapsed_string", json!(duration_string(elapsed_clamped)));
            set("current_phase", json!(transition.phase));
            set("current_cycle", json!(transition.cycle));
            set("current_environment_name", json!(transition.environment_name));
            set(
                "current_environment_state",
                Value::Object(transition.environment_state.clone()),
            );
        }
        for (variable, value) in &transition.environment_state {
            tree.set(
                Subtree::Environment,
                &[DESIRED[0], DESIRED[1], variable.as_str()],
                value.clone(),
            );
        }
    });
}

/// Null every progress field and every desired setpoint.
pub fn clear(state: &SharedState) {
    state.update(|tree| {
        for field in PROGRESS_FIELDS {
            tree.set(Subtree::Recipe, &[field], Value::Null);
        }
        clear_desired(tree);
    });
}

fn clear_desired(tree: &mut StateTree) {
    let keys: Vec<String> = tree
        .get(Subtree::Environment, &DESIRED)
        .and_then(Value::as_object)
        .map(|desired| desired.keys().cloned().collect())
        .unwrap_or_default();
    for key in keys {
        tree.set(
            Subtree::Environment,
            &[DESIRED[0], DESIRED[1], key.as_str()],
            Value::Null,
        );
    }
}

pub fn start_minutes(state: &SharedState) -> Option<i64> {
    state.get_as(Subtree::Recipe, &["start_timestamp_minutes"])
}

pub fn last_update_minute(state: &SharedState) -> Option<i64> {
    state.get_as(Subtree::Recipe, &["last_update_minute"])
}
