//! Recipe playback actor.
//!
//! The engine compiles a recipe on `START`, waits in `QUEUED` for the start
//! minute, then walks the schedule in `NORMAL`, pushing each environment into
//! the desired setpoints. Progress lives in the `recipe` sub-tree so a
//! restarted engine can resume from the persisted snapshot.

use crate::events::RecipeEvent;
use crate::modes::RecipeMode;
use crate::parser::ParseError;
use crate::progress;
use crate::schedule::Schedule;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use verdant_common::actor::{ActorCore, StateMachine, parse_mode};
use verdant_common::clock::Clock;
use verdant_common::state::{Namespace, SharedState, Subtree};
use verdant_common::store::{Store, StoreError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("No start request pending")]
    NoPendingStart,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Persisted transitions are missing or corrupt")]
    MissingTransitions,

    #[error("No start timestamp recorded")]
    MissingStart,
}

#[derive(Debug, Clone, PartialEq)]
struct StartRequest {
    uuid: String,
    start_timestamp: Option<f64>,
}

pub struct RecipeEngine {
    core: ActorCore<RecipeMode, RecipeEvent>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    schedule: Option<Schedule>,
    pending: Option<StartRequest>,
    last_delay_log: Option<i64>,
}

impl RecipeEngine {
    pub fn new(
        state: Arc<SharedState>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        tick: Duration,
    ) -> Self {
        Self {
            core: ActorCore::new("recipe", Namespace::root(Subtree::Recipe), state, tick),
            store,
            clock,
            schedule: None,
            pending: None,
            last_delay_log: None,
        }
    }

    fn state(&self) -> &SharedState {
        self.core.state()
    }

    // ─── INIT ───────────────────────────────────────────────────────

    fn run_init_mode(&mut self) {
        info!("📖 Recipe engine initializing");
        let stored: Option<RecipeMode> = self
            .state()
            .get_as::<String>(Subtree::Recipe, &["stored_mode"])
            .and_then(|name| parse_mode(&name));
        self.state().set(Subtree::Recipe, &["stored_mode"], serde_json::Value::Null);

        let Some(stored) = stored.filter(RecipeMode::is_resumable) else {
            self.core.transition_to(RecipeMode::NoRecipe);
            return;
        };

        if stored != RecipeMode::Pause {
            if let Err(e) = self.restore_schedule() {
                error!("Unable to resume recipe in {} mode: {}", stored, e);
                self.core.transition_to(RecipeMode::NoRecipe);
                return;
            }
        }
        info!("Resuming recipe in {} mode", stored);
        self.core.transition_to(stored);
    }

    fn restore_schedule(&mut self) -> Result<(), RecipeError> {
        progress::start_minutes(self.state()).ok_or(RecipeError::MissingStart)?;
        let transitions = self.store.load_recipe_transitions()?;
        let schedule =
            Schedule::from_transitions(transitions).ok_or(RecipeError::MissingTransitions)?;
        self.schedule = Some(schedule);
        Ok(())
    }

    // ─── NORECIPE / PAUSE ───────────────────────────────────────────

    async fn run_idle_mode(&mut self, mode: RecipeMode) {
        progress::clear(self.state());
        self.schedule = None;
        loop {
            match self.core.idle().await {
                Some(RecipeEvent::Start {
                    uuid,
                    start_timestamp,
                }) => {
                    self.pending = Some(StartRequest {
                        uuid,
                        start_timestamp,
                    });
                    self.core.set_mode(RecipeMode::Start);
                }
                Some(event) => warn!("Ignoring {:?} in {} mode", event, mode),
                None => {}
            }
            if self.core.request_transition(mode) {
                break;
            }
        }
    }

    // ─── START ──────────────────────────────────────────────────────

    fn run_start_mode(&mut self) {
        match self.start_recipe() {
            Ok(()) => self.core.transition_to(RecipeMode::Queued),
            Err(e) => {
                error!("❌ Unable to start recipe: {}", e);
                progress::clear(self.state());
                self.schedule = None;
                self.core.transition_to(RecipeMode::NoRecipe);
            }
        }
    }

    fn start_recipe(&mut self) -> Result<(), RecipeError> {
        let request = self.pending.take().ok_or(RecipeError::NoPendingStart)?;
        let recipe = self.store.load_recipe(&request.uuid)?;
        let schedule = Schedule::compile(&recipe)?;
        self.store.save_recipe_transitions(schedule.transitions())?;

        let start_minutes = match request.start_timestamp {
            Some(ts) => (ts / 60.0).floor() as i64,
            None => self.clock.now_minutes(),
        };
        progress::record_start(
            self.state(),
            &recipe.uuid,
            &recipe.name,
            schedule.duration_minutes(),
            start_minutes,
        );
        info!(
            "🌱 Started recipe '{}' ({}), {} transitions",
            recipe.name,
            progress::duration_string(schedule.duration_minutes()),
            schedule.transitions().len()
        );
        self.schedule = Some(schedule);
        self.last_delay_log = None;
        Ok(())
    }

    // ─── QUEUED ─────────────────────────────────────────────────────

    async fn run_queued_mode(&mut self) {
        loop {
            let Some(start) = progress::start_minutes(self.state()) else {
                error!("Queued recipe has no start timestamp");
                self.core.set_mode(RecipeMode::Stop);
                break;
            };
            let remaining = start - self.clock.now_minutes();
            if remaining <= 0 {
                self.core.set_mode(RecipeMode::Normal);
            } else {
                self.log_delay(remaining);
            }

            if self.core.mode() == RecipeMode::Queued {
                match self.core.idle().await {
                    Some(RecipeEvent::Stop) => self.core.set_mode(RecipeMode::Stop),
                    Some(event) => warn!("Ignoring {:?} in QUEUED mode", event),
                    None => {}
                }
            }
            if self.core.request_transition(RecipeMode::Queued) {
                break;
            }
        }
    }

    /// Hourly while more than an hour remains, then every minute.
    fn log_delay(&mut self, remaining: i64) {
        let bucket = if remaining > 60 {
            remaining / 60 * 60
        } else {
            remaining
        };
        if self.last_delay_log == Some(bucket) {
            return;
        }
        self.last_delay_log = Some(bucket);
        if remaining > 60 {
            info!("⏳ Recipe starts in {} hours", remaining / 60);
        } else {
            info!("⏳ Recipe starts in {} minutes", remaining);
        }
    }

    // ─── NORMAL ─────────────────────────────────────────────────────

    async fn run_normal_mode(&mut self) {
        if self.schedule.is_none() {
            if let Err(e) = self.restore_schedule() {
                error!("Unable to run recipe: {}", e);
                self.core.set_mode(RecipeMode::Error);
                return;
            }
        }

        loop {
            self.update_environment();

            if self.core.mode() == RecipeMode::Normal {
                match self.core.idle().await {
                    Some(RecipeEvent::Stop) => self.core.set_mode(RecipeMode::Stop),
                    Some(RecipeEvent::Pause) => self.core.set_mode(RecipeMode::Pause),
                    Some(event) => warn!("Ignoring {:?} in NORMAL mode", event),
                    None => {}
                }
            }
            if self.core.request_transition(RecipeMode::Normal) {
                break;
            }
        }
    }

    /// Apply the floor transition when the elapsed minute has moved on.
    fn update_environment(&mut self) {
        let Some(schedule) = self.schedule.as_ref() else {
            return;
        };
        let Some(start) = progress::start_minutes(self.core.state()) else {
            error!("Running recipe has no start timestamp");
            self.core.set_mode(RecipeMode::Error);
            return;
        };
        let elapsed = self.clock.now_minutes() - start;
        let last = progress::last_update_minute(self.core.state()).unwrap_or(-1);
        if elapsed <= last {
            return;
        }

        let Some(transition) = schedule.floor(elapsed) else {
            return;
        };
        progress::record_playback(
            self.core.state(),
            elapsed,
            schedule.duration_minutes(),
            transition,
        );
        debug!(
            "Recipe minute {}: {} / {} / {}",
            elapsed, transition.phase, transition.cycle, transition.environment_name
        );

        if transition.is_end() {
            info!("🏁 Recipe complete");
            self.core.set_mode(RecipeMode::Stop);
        }
    }

    // ─── STOP / ERROR / RESET ───────────────────────────────────────

    fn run_stop_mode(&mut self) {
        info!("Stopping recipe");
        progress::clear(self.state());
        self.schedule = None;
        self.core.transition_to(RecipeMode::NoRecipe);
    }

    async fn run_error_mode(&mut self) {
        progress::clear(self.state());
        self.schedule = None;
        self.core.idle_until_transition(RecipeMode::Error).await;
    }

    fn run_reset_mode(&mut self) {
        info!("Resetting recipe engine");
        self.core.transition_to(RecipeMode::Init);
    }
}

impl StateMachine for RecipeEngine {
    type Mode = RecipeMode;
    type Event = RecipeEvent;

    fn core(&self) -> &ActorCore<RecipeMode, RecipeEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore<RecipeMode, RecipeEvent> {
        &mut self.core
    }

    async fn run_mode(&mut self, mode: RecipeMode) {
        match mode {
            RecipeMode::Init => self.run_init_mode(),
            RecipeMode::NoRecipe | RecipeMode::Pause => self.run_idle_mode(mode).await,
            RecipeMode::Start => self.run_start_mode(),
            RecipeMode::Queued => self.run_queued_mode().await,
            RecipeMode::Normal => self.run_normal_mode().await,
            RecipeMode::Stop => self.run_stop_mode(),
            RecipeMode::Error => self.run_error_mode().await,
            RecipeMode::Reset => self.run_reset_mode(),
            RecipeMode::Shutdown => {}
        }
    }
}
