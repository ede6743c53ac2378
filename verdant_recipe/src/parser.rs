//! Recipe compiler.
//!
//! Flattens the nested `phase → repeated cycles → environment` schedule into
//! a transition table ordered by start minute, closed by an `End` sentinel at
//! the total duration.

use serde_json::{Map, Value};
use thiserror::Error;
use verdant_common::documents::{RecipeCycle, RecipeDocument, RecipeTransition};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Cycle '{cycle}' of phase '{phase}' has neither duration_hours nor duration_minutes")]
    MissingDuration { phase: String, cycle: String },

    #[error("Cycle '{cycle}' of phase '{phase}' has an invalid duration: {value}")]
    InvalidDuration {
        phase: String,
        cycle: String,
        value: f64,
    },

    #[error("Cycle '{cycle}' references unknown environment '{environment}'")]
    UnknownEnvironment { cycle: String, environment: String },

    #[error("Recipe '{recipe}' is longer than {} minutes", MAX_RECIPE_MINUTES)]
    TooLong { recipe: String },
}

/// Upper bound on a recipe's length. Elapsed minutes are signed, so every
/// transition minute must fit in an `i64`.
pub const MAX_RECIPE_MINUTES: u64 = i64::MAX as u64;

/// Compile `recipe` into its transition table.
pub fn parse(recipe: &RecipeDocument) -> Result<Vec<RecipeTransition>, ParseError> {
    let mut transitions = Vec::new();
    let mut minute: u64 = 0;

    for phase in &recipe.phases {
        for _ in 0..phase.repeat {
            for cycle in &phase.cycles {
                let (environment_name, environment_state) = resolve_environment(recipe, cycle)?;
                let duration = duration_minutes(&phase.name, cycle)?;
                transitions.push(RecipeTransition {
                    minute,
                    phase: phase.name.clone(),
                    cycle: cycle.name.clone(),
                    environment_name,
                    environment_state,
                });
                minute = minute
                    .checked_add(duration)
                    .filter(|total| *total <= MAX_RECIPE_MINUTES)
                    .ok_or_else(|| ParseError::TooLong {
                        recipe: recipe.name.clone(),
                    })?;
            }
        }
    }

    transitions.push(RecipeTransition::end(minute));
    Ok(transitions)
}

/// Cycle length in whole minutes. Hours take precedence over minutes.
pub fn duration_minutes(phase: &str, cycle: &RecipeCycle) -> Result<u64, ParseError> {
    let raw = match (cycle.duration_hours, cycle.duration_minutes) {
        (Some(hours), _) => hours * 60.0,
        (None, Some(minutes)) => minutes,
        (None, None) => {
            return Err(ParseError::MissingDuration {
                phase: phase.to_string(),
                cycle: cycle.name.clone(),
            });
        }
    };
    if !raw.is_finite() || raw < 0.0 || raw.round() > MAX_RECIPE_MINUTES as f64 {
        return Err(ParseError::InvalidDuration {
            phase: phase.to_string(),
            cycle: cycle.name.clone(),
            value: raw,
        });
    }
    Ok(raw.round() as u64)
}

/// Shallow copy of the cycle's environment with `name` split off.
fn resolve_environment(
    recipe: &RecipeDocument,
    cycle: &RecipeCycle,
) -> Result<(String, Map<String, Value>), ParseError> {
    let mut state = recipe
        .environments
        .get(&cycle.environment)
        .cloned()
        .ok_or_else(|| ParseError::UnknownEnvironment {
            cycle: cycle.name.clone(),
            environment: cycle.environment.clone(),
        })?;
    let name = match state.remove("name") {
        Some(Value::String(name)) => name,
        Some(other) => other.to_string(),
        None => cycle.environment.clone(),
    };
    Ok((name, state))
}
