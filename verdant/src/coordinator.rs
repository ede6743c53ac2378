//! # Coordinator
//!
//! Owns the boot sequence of the chamber:
//!
//! ```text
//! INIT ──► CONFIG ──► SETUP ──► NORMAL ──► LOAD
//!   ▲        ▲                               │
//!   │        └───────────────────────────────┘
//! RESET ◄── ERROR
//! ```
//!
//! `INIT` restores the persisted snapshot, `CONFIG` resolves the active
//! device configuration, `SETUP` spawns the recipe engine, the satellites
//! and the configured peripherals and controllers, and waits for all of them
//! to leave `INIT`. `NORMAL` persists snapshots and environment history.
//! `LOAD` tears the device actors down, bounded by a timeout, before
//! reconfiguring. `RESET` waits the same way for every child except the
//! recipe engine before booting again.

use crate::events::CoordinatorEvent;
use crate::gateway::EventGateway;
use crate::modes::CoordinatorMode;
use crate::satellites::{self, LogSink, TelemetrySink};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use verdant_common::actor::{Actor, ActorCore, ManagedActor, StateMachine};
use verdant_common::clock::Clock;
use verdant_common::config::VerdantConfig;
use verdant_common::consts::{TEARDOWN_POLL_MS, UNSPECIFIED_DEVICE_CONFIG};
use verdant_common::documents::{ActorConfig, DeviceConfig, EnvironmentRecord};
use verdant_common::state::{Namespace, SharedState, StateTree, Subtree};
use verdant_common::store::{Store, StoreError};
use verdant_devices::{ActorKind, ActorRegistry, BusLock, DynamicActorContext};
use verdant_recipe::RecipeEngine;

pub struct Coordinator {
    core: ActorCore<CoordinatorMode, CoordinatorEvent>,
    config: VerdantConfig,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    registry: ActorRegistry,
    bus: BusLock,
    sink: Arc<dyn TelemetrySink>,
    recipe: Actor<RecipeEngine>,
    satellites: Vec<Box<dyn ManagedActor>>,
    dynamic: Vec<Box<dyn ManagedActor>>,
    device_config: Option<DeviceConfig>,
    previous_config_uuid: Option<String>,
    /// Set between a successful `LOAD` and the following `NORMAL`.
    reconfiguring: bool,
}

impl Coordinator {
    pub fn new(
        config: VerdantConfig,
        state: Arc<SharedState>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        registry: ActorRegistry,
    ) -> Self {
        let tick = config.timing.tick();
        let recipe = Actor::new(RecipeEngine::new(
            Arc::clone(&state),
            Arc::clone(&store),
            Arc::clone(&clock),
            tick,
        ));
        Self {
            core: ActorCore::new("coordinator", Namespace::root(Subtree::Device), state, tick),
            config,
            store,
            clock,
            registry,
            bus: BusLock::new(),
            sink: Arc::new(LogSink),
            recipe,
            satellites: Vec::new(),
            dynamic: Vec::new(),
            device_config: None,
            previous_config_uuid: None,
            reconfiguring: false,
        }
    }

    /// Replace the telemetry transport used by the iot satellite.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Request validation front-end bound to this coordinator and its
    /// recipe engine.
    pub fn gateway(&self) -> EventGateway {
        EventGateway::new(
            Arc::clone(self.core.state()),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.core.sender(),
            self.recipe.sender(),
        )
    }

    fn state(&self) -> &SharedState {
        self.core.state()
    }

    // ─── INIT ───────────────────────────────────────────────────────

    fn run_init_mode(&mut self) {
        info!("🔧 Coordinator initializing");
        match self.store.load_reference_data() {
            Ok(summary) => {
                info!(
                    "📚 Reference data: {} recipes, {} device configs, {} peripheral setups, {} controller setups",
                    summary.recipes,
                    summary.device_configs,
                    summary.peripheral_setups,
                    summary.controller_setups
                );
                if summary.rejected > 0 {
                    warn!("Skipped {} invalid reference document(s)", summary.rejected);
                }
            }
            Err(e) => {
                error!("❌ Unable to load reference data: {}", e);
                self.core.transition_to(CoordinatorMode::Error);
                return;
            }
        }

        match self.store.load_snapshot() {
            Ok(Some(snapshot)) => self.restore_snapshot(&snapshot),
            Ok(None) => info!("No snapshot found, starting fresh"),
            Err(e) => warn!("Unable to load snapshot, starting fresh: {}", e),
        }
        self.core.transition_to(CoordinatorMode::Config);
    }

    /// Carry recipe progress, per-actor `stored` settings and desired
    /// setpoints over from the previous run.
    fn restore_snapshot(&mut self, snapshot: &StateTree) {
        let restore_recipe = !self.recipe.is_spawned();
        self.state().update(|tree| {
            if restore_recipe {
                for (key, value) in &snapshot.recipe {
                    if key != "mode" {
                        tree.recipe.insert(key.clone(), value.clone());
                    }
                }
                let mode = snapshot.recipe.get("mode").cloned().unwrap_or(Value::Null);
                tree.recipe.insert("stored_mode".to_string(), mode);
            }
            for subtree in [Subtree::Peripherals, Subtree::Controllers] {
                for (name, entry) in snapshot.subtree(subtree) {
                    if let Some(stored) = entry.get("stored") {
                        tree.set(subtree, &[name.as_str(), "stored"], stored.clone());
                    }
                }
            }
            if let Some(desired) = snapshot.get(Subtree::Environment, &["sensor", "desired"]) {
                tree.set(Subtree::Environment, &["sensor", "desired"], desired.clone());
            }
        });

        self.previous_config_uuid = snapshot
            .get(Subtree::Device, &["config_uuid"])
            .and_then(Value::as_str)
            .map(str::to_string);
        info!("💾 Restored state from snapshot");
    }

    // ─── CONFIG ─────────────────────────────────────────────────────

    fn run_config_mode(&mut self) {
        let name = self.active_config_name();
        let config = match self.resolve_device_config(&name) {
            Ok(config) => config,
            Err(e) => {
                error!("❌ Unable to load device config '{}': {}", name, e);
                self.core.transition_to(CoordinatorMode::Error);
                return;
            }
        };

        if self.previous_config_uuid.as_deref() != Some(config.uuid.as_str()) {
            if self.previous_config_uuid.is_some() {
                info!("Device config changed, clearing device state");
            }
            self.state().update(|tree| {
                tree.peripherals.clear();
                tree.controllers.clear();
                tree.remove(Subtree::Environment, &["reported_sensor_stats"]);
                tree.remove(Subtree::Environment, &["sensor", "reported"]);
            });
        }

        self.state().update(|tree| {
            tree.set(Subtree::Device, &["config_uuid"], config.uuid.clone().into());
            tree.set(Subtree::Device, &["config_name"], config.name.clone().into());
        });
        info!("⚙️  Using device config '{}' ({})", config.name, config.uuid);
        self.previous_config_uuid = Some(config.uuid.clone());
        self.device_config = Some(config);
        self.core.transition_to(CoordinatorMode::Setup);
    }

    /// Pointer contents, falling back to the unspecified config.
    fn active_config_name(&self) -> String {
        let fallback = match self.store.read_config_pointer() {
            Ok(Some(name)) if !name.trim().is_empty() => return name.trim().to_string(),
            Ok(_) => "Config pointer is empty, using unspecified config".to_string(),
            Err(e) => format!("Unable to read config pointer, using unspecified config: {e}"),
        };
        warn!("{}", fallback);
        if let Err(e) = self.store.write_config_pointer(UNSPECIFIED_DEVICE_CONFIG) {
            warn!("Unable to write config pointer: {}", e);
        }
        UNSPECIFIED_DEVICE_CONFIG.to_string()
    }

    fn resolve_device_config(&self, name: &str) -> Result<DeviceConfig, StoreError> {
        match self.store.load_device_config(name) {
            Err(StoreError::NotFound { .. }) if name == UNSPECIFIED_DEVICE_CONFIG => {
                warn!("No unspecified device config on disk, running without devices");
                Ok(DeviceConfig::empty(
                    UNSPECIFIED_DEVICE_CONFIG,
                    UNSPECIFIED_DEVICE_CONFIG,
                ))
            }
            result => result,
        }
    }

    // ─── SETUP ──────────────────────────────────────────────────────

    async fn run_setup_mode(&mut self) {
        if !self.reconfiguring {
            self.start_recipe_engine();
            self.start_satellites();
        }
        self.start_dynamic_actors();

        info!(
            "⏳ Waiting for {} actor(s) to start",
            1 + self.satellites.len() + self.dynamic.len()
        );
        loop {
            if self.children_started() {
                self.reconfiguring = false;
                self.core.transition_to(CoordinatorMode::Normal);
                break;
            }
            tokio::time::sleep(self.config.timing.setup_poll()).await;
            if let Some(event) = self.core.poll_event() {
                warn!("Ignoring {:?} in SETUP mode", event);
            }
            if self.core.request_transition(CoordinatorMode::Setup) {
                break;
            }
        }
    }

    fn start_recipe_engine(&mut self) {
        if self.recipe.is_spawned() {
            return;
        }
        if let Err(e) = self.recipe.spawn() {
            error!("Unable to spawn recipe engine: {}", e);
        }
    }

    fn start_satellites(&mut self) {
        if !self.satellites.is_empty() {
            return;
        }
        self.satellites = satellites::build(&self.config, self.core.state(), Arc::clone(&self.sink));
        for satellite in &mut self.satellites {
            if let Err(e) = satellite.spawn() {
                error!("Unable to spawn {}: {}", satellite.name(), e);
            }
        }
    }

    fn start_dynamic_actors(&mut self) {
        let Some(config) = self.device_config.clone() else {
            return;
        };
        let entries = [
            (ActorKind::Peripheral, config.peripherals.unwrap_or_default()),
            (ActorKind::Controller, config.controllers.unwrap_or_default()),
        ];
        for (kind, list) in entries {
            for entry in &list {
                let Some(mut actor) = self.build_dynamic(kind, entry) else {
                    continue;
                };
                match actor.spawn() {
                    Ok(()) => {
                        debug!("Spawned {} '{}'", kind, entry.name);
                        self.dynamic.push(actor);
                    }
                    Err(e) => error!("Unable to spawn {} '{}': {}", kind, entry.name, e),
                }
            }
        }
        info!("🔌 {} device actor(s) configured", self.dynamic.len());
    }

    fn build_dynamic(&self, kind: ActorKind, entry: &ActorConfig) -> Option<Box<dyn ManagedActor>> {
        let setup = match kind {
            ActorKind::Peripheral => self.store.peripheral_setup(&entry.uuid),
            ActorKind::Controller => self.store.controller_setup(&entry.uuid),
        };
        let Some(setup) = setup else {
            error!(
                "Unable to find {} setup {} for '{}', skipping",
                kind, entry.uuid, entry.name
            );
            return None;
        };

        let context = DynamicActorContext {
            kind,
            config: entry.clone(),
            setup,
            state: Arc::clone(self.core.state()),
            bus: self.bus.clone(),
            simulate: self.config.hardware.simulate,
            tick: self.config.timing.tick(),
        };
        match self.registry.create(context) {
            Ok(actor) => Some(actor),
            Err(e) => {
                error!("Unable to create {} '{}', skipping: {}", kind, entry.name, e);
                None
            }
        }
    }

    fn children_started(&self) -> bool {
        self.recipe.has_left_init()
            && self.satellites.iter().all(|actor| actor.has_left_init())
            && self.dynamic.iter().all(|actor| actor.has_left_init())
    }

    // ─── NORMAL ─────────────────────────────────────────────────────

    async fn run_normal_mode(&mut self) {
        info!("🌿 Chamber running");
        let snapshot_interval = self.config.timing.snapshot_interval();
        let mut last_snapshot = Instant::now();
        let mut last_record = match self.store.latest_environment_record() {
            Ok(record) => record.map(|record| record.timestamp),
            Err(e) => {
                warn!("Unable to read environment history: {}", e);
                None
            }
        };

        loop {
            if last_snapshot.elapsed() >= snapshot_interval {
                self.save_snapshot();
                last_snapshot = Instant::now();
            }
            self.record_environment(&mut last_record);

            match self.core.idle().await {
                Some(CoordinatorEvent::LoadConfig { name }) => self.request_load(&name),
                None => {}
            }
            if self.core.request_transition(CoordinatorMode::Normal) {
                break;
            }
        }
    }

    fn save_snapshot(&self) {
        if let Err(e) = self.store.save_snapshot(&self.state().snapshot()) {
            warn!("Unable to save snapshot: {}", e);
        }
    }

    fn record_environment(&self, last: &mut Option<DateTime<Utc>>) {
        let now = self.clock.now();
        let interval = chrono::Duration::seconds(
            self.config.timing.environment_record_interval_s as i64,
        );
        if last.is_some_and(|previous| now - previous < interval) {
            return;
        }
        *last = Some(now);

        let record = EnvironmentRecord {
            timestamp: now,
            state: self.state().update(|tree| tree.environment.clone()),
        };
        match self.store.append_environment_record(&record) {
            Ok(()) => debug!("Recorded environment at {}", now),
            Err(e) => warn!("Unable to record environment: {}", e),
        }
    }

    fn request_load(&mut self, name: &str) {
        if let Err(e) = self.store.write_config_pointer(name) {
            error!("Unable to switch to device config '{}': {}", name, e);
            return;
        }
        info!("🔄 Loading device config '{}'", name);
        self.core.set_mode(CoordinatorMode::Load);
    }

    // ─── LOAD ───────────────────────────────────────────────────────

    async fn run_load_mode(&mut self) {
        info!("Stopping {} device actor(s)", self.dynamic.len());
        let mut dynamic = std::mem::take(&mut self.dynamic);
        match self.stop_actors(&mut dynamic, CoordinatorMode::Load).await {
            Teardown::Stopped => {
                self.reconfiguring = true;
                self.core.transition_to(CoordinatorMode::Config);
            }
            Teardown::TimedOut(stuck) => {
                error!(
                    "❌ Timed out after {:?} waiting for {} to stop",
                    self.config.timing.load_timeout(),
                    stuck.join(", ")
                );
                self.dynamic = dynamic;
                self.core.transition_to(CoordinatorMode::Error);
            }
            Teardown::Interrupted => self.dynamic = dynamic,
        }
    }

    /// Ask `actors` to stop, then poll until all have terminated, the load
    /// timeout expires or the mode leaves `running`.
    async fn stop_actors(
        &mut self,
        actors: &mut [Box<dyn ManagedActor>],
        running: CoordinatorMode,
    ) -> Teardown {
        for actor in actors.iter() {
            actor.shutdown();
        }

        let deadline = Instant::now() + self.config.timing.load_timeout();
        let poll = Duration::from_millis(TEARDOWN_POLL_MS);
        loop {
            if actors.iter().all(|actor| actor.is_terminated()) {
                return Teardown::Stopped;
            }
            if Instant::now() >= deadline {
                return Teardown::TimedOut(
                    actors
                        .iter()
                        .filter(|actor| !actor.is_terminated())
                        .map(|actor| actor.name().to_string())
                        .collect(),
                );
            }

            tokio::time::sleep(poll).await;
            if let Some(event) = self.core.poll_event() {
                warn!("Ignoring {:?} in {} mode", event, running);
            }
            if self.core.request_transition(running) {
                return Teardown::Interrupted;
            }
        }
    }

    fn shutdown_dynamic(&self) {
        for actor in &self.dynamic {
            actor.shutdown();
        }
    }

    // ─── ERROR / RESET ──────────────────────────────────────────────

    async fn run_error_mode(&mut self) {
        error!("Coordinator in ERROR mode, waiting for reset");
        self.shutdown_dynamic();
        self.core.idle_until_transition(CoordinatorMode::Error).await;
    }

    /// Old actors must be gone before `SETUP` respawns under the same
    /// namespaces, or their final mirror writes land on the new ones.
    async fn run_reset_mode(&mut self) {
        info!("🔄 Resetting coordinator");
        let mut actors: Vec<Box<dyn ManagedActor>> = self
            .satellites
            .drain(..)
            .chain(self.dynamic.drain(..))
            .collect();
        match self.stop_actors(&mut actors, CoordinatorMode::Reset).await {
            Teardown::Stopped => {}
            Teardown::TimedOut(stuck) => warn!(
                "Abandoning {} after {:?}",
                stuck.join(", "),
                self.config.timing.load_timeout()
            ),
            Teardown::Interrupted => return,
        }
        self.reconfiguring = false;
        self.core.transition_to(CoordinatorMode::Init);
    }
}

/// Outcome of a bounded teardown.
enum Teardown {
    Stopped,
    TimedOut(Vec<String>),
    /// The mode changed while waiting, e.g. on shutdown.
    Interrupted,
}

impl StateMachine for Coordinator {
    type Mode = CoordinatorMode;
    type Event = CoordinatorEvent;

    fn core(&self) -> &ActorCore<CoordinatorMode, CoordinatorEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore<CoordinatorMode, CoordinatorEvent> {
        &mut self.core
    }

    async fn run_mode(&mut self, mode: CoordinatorMode) {
        match mode {
            CoordinatorMode::Init => self.run_init_mode(),
            CoordinatorMode::Config => self.run_config_mode(),
            CoordinatorMode::Setup => self.run_setup_mode().await,
            CoordinatorMode::Normal => self.run_normal_mode().await,
            CoordinatorMode::Load => self.run_load_mode().await,
            CoordinatorMode::Error => self.run_error_mode().await,
            CoordinatorMode::Reset => self.run_reset_mode().await,
            CoordinatorMode::Shutdown => {}
        }
    }

    fn on_shutdown(&mut self) {
        self.save_snapshot();
        self.recipe.shutdown();
        for actor in self.satellites.iter().chain(self.dynamic.iter()) {
            actor.shutdown();
        }
    }
}
