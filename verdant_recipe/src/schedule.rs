//! Playback table with floor lookup.

use crate::parser::{self, ParseError};
use verdant_common::documents::{RecipeDocument, RecipeTransition};

/// A compiled recipe ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    transitions: Vec<RecipeTransition>,
}

impl Schedule {
    pub fn compile(recipe: &RecipeDocument) -> Result<Self, ParseError> {
        Ok(Self {
            transitions: parser::parse(recipe)?,
        })
    }

    /// Rebuild from a persisted table. Rejects tables that are empty,
    /// unordered or not closed by the `End` sentinel.
    pub fn from_transitions(transitions: Vec<RecipeTransition>) -> Option<Self> {
        let closed = transitions.last().is_some_and(RecipeTransition::is_end);
        let ordered = transitions.windows(2).all(|w| w[0].minute <= w[1].minute);
        (closed && ordered).then_some(Self { transitions })
    }

    pub fn transitions(&self) -> &[RecipeTransition] {
        &self.transitions
    }

    /// Total length in minutes: the minute of the `End` sentinel.
    pub fn duration_minutes(&self) -> u64 {
        self.transitions.last().map_or(0, |t| t.minute)
    }

    /// The transition with the greatest minute not exceeding `elapsed`.
    ///
    /// Ties resolve to the last entry at that minute, so zero-length cycles
    /// are skipped. Negative `elapsed` has no transition.
    pub fn floor(&self, elapsed: i64) -> Option<&RecipeTransition> {
        let elapsed = u64::try_from(elapsed).ok()?;
        let upper = self.transitions.partition_point(|t| t.minute <= elapsed);
        upper.checked_sub(1).map(|i| &self.transitions[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schedule() -> Schedule {
        let recipe: RecipeDocument = serde_json::from_value(json!({
            "name": "Basil",
            "uuid": "r-basil",
            "environments": {
                "day": { "name": "Day", "light_ppfd_umol_m2_s": 400 },
                "night": { "name": "Night", "light_ppfd_umol_m2_s": 0 }
            },
            "phases": [{ "name": "Grow", "repeat": 2, "cycles": [
                { "name": "Day", "environment": "day", "duration_hours": 16 },
                { "name": "Night", "environment": "night", "duration_hours": 8 }
            ]}]
        }))
        .unwrap();
        Schedule::compile(&recipe).unwrap()
    }

    #[test]
    fn duration_is_end_minute() {
        assert_eq!(schedule().duration_minutes(), 48 * 60);
    }

    #[test]
    fn floor_lookup_finds_active_cycle() {
        let schedule = schedule();
        assert_eq!(schedule.floor(0).unwrap().environment_name, "Day");
        assert_eq!(schedule.floor(16 * 60 - 1).unwrap().environment_name, "Day");
        assert_eq!(schedule.floor(16 * 60).unwrap().environment_name, "Night");
        assert_eq!(schedule.floor(30 * 60).unwrap().environment_name, "Day");
        assert!(schedule.floor(48 * 60).unwrap().is_end());
        assert!(schedule.floor(100 * 60).unwrap().is_end());
        assert!(schedule.floor(-1).is_none());
    }

    #[test]
    fn floor_prefers_last_entry_at_same_minute() {
        let mut transitions = schedule().transitions().to_vec();
        transitions.insert(1, transitions[0].clone());
        transitions[1].cycle = "Zero-length".into();
        transitions[0].cycle = "First".into();
        let schedule = Schedule::from_transitions(transitions).unwrap();
        assert_eq!(schedule.floor(0).unwrap().cycle, "Zero-length");
    }

    #[test]
    fn persisted_tables_are_checked() {
        let good = schedule().transitions().to_vec();
        assert!(Schedule::from_transitions(good.clone()).is_some());
        assert!(Schedule::from_transitions(Vec::new()).is_none());

        let mut open = good.clone();
        open.pop();
        assert!(Schedule::from_transitions(open).is_none());

        let mut unordered = good;
        unordered.swap(0, 1);
        assert!(Schedule::from_transitions(unordered).is_none());
    }
}
