//! # Coordinator Tests
//!
//! Boots a spawned coordinator against an in-memory store and drives it
//! through configuration, reconfiguration and recovery.

use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use verdant::satellites::{LogSink, TelemetryError, TelemetrySink};
use verdant::{Coordinator, EventGateway};
use verdant_common::actor::{Actor, ActorError, ManagedActor};
use verdant_common::clock::{Clock, ManualClock};
use verdant_common::config::VerdantConfig;
use verdant_common::documents::{ActorConfig, DeviceConfig, RecipeDocument, SetupDescriptor};
use verdant_common::state::{SharedState, StateTree, Subtree};
use verdant_common::store::{MemoryStore, Store};
use verdant_devices::{ActorRegistry, DynamicActorContext};

// ─── Helpers ────────────────────────────────────────────────────────

const START_MINUTE: i64 = 29_000_000;

fn config(data_dir: &Path) -> VerdantConfig {
    let mut config = VerdantConfig::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.timing.tick_ms = 5;
    config.timing.setup_poll_ms = 5;
    config.timing.snapshot_interval_ms = 10;
    config.timing.load_timeout_s = 1;
    config.hardware.simulate = true;
    config.satellites.probe_address = "127.0.0.1:1".into();
    config.satellites.probe_timeout_ms = 50;
    config
}

fn sensor_setup() -> SetupDescriptor {
    serde_json::from_value(json!({
        "uuid": "s-sim-sensor",
        "name": "Simulated temperature probe",
        "module_name": "simulation",
        "class_name": "SimulatedSensor",
        "properties": { "variables": { "air_temperature_celsius": 21.0 } }
    }))
    .unwrap()
}

fn setup(uuid: &str, module: &str, class: &str) -> SetupDescriptor {
    SetupDescriptor {
        uuid: uuid.into(),
        name: class.into(),
        module_name: module.into(),
        class_name: class.into(),
        properties: Map::new(),
    }
}

fn device(name: &str, uuid: &str, peripherals: &[(&str, &str)]) -> DeviceConfig {
    DeviceConfig {
        name: name.into(),
        uuid: uuid.into(),
        peripherals: Some(
            peripherals
                .iter()
                .map(|(name, setup)| ActorConfig {
                    name: (*name).into(),
                    uuid: (*setup).into(),
                    parameters: Map::new(),
                })
                .collect(),
        ),
        controllers: None,
    }
}

fn basil() -> RecipeDocument {
    serde_json::from_value(json!({
        "name": "Basil",
        "uuid": "r-basil",
        "environments": {
            "day": { "name": "Day", "air_temperature_celsius": 24 },
            "night": { "name": "Night", "air_temperature_celsius": 18 }
        },
        "phases": [{ "name": "Grow", "repeat": 1, "cycles": [
            { "name": "Day", "environment": "day", "duration_minutes": 60 },
            { "name": "Night", "environment": "night", "duration_minutes": 30 }
        ]}]
    }))
    .unwrap()
}

/// Never stops: shutdown requests are swallowed.
struct Stubborn {
    name: String,
}

impl ManagedActor for Stubborn {
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&mut self) -> Result<(), ActorError> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn reset(&self) {}

    fn mode(&self) -> &'static str {
        "NORMAL"
    }

    fn has_left_init(&self) -> bool {
        true
    }

    fn is_terminated(&self) -> bool {
        false
    }
}

fn stubborn(context: DynamicActorContext) -> Box<dyn ManagedActor> {
    Box::new(Stubborn {
        name: context.name().to_string(),
    })
}

/// Telemetry link that stalls its caller once when armed.
#[derive(Default)]
struct StallingSink {
    armed: AtomicBool,
    stalled: AtomicBool,
}

impl StallingSink {
    const STALL: Duration = Duration::from_millis(500);
}

impl TelemetrySink for StallingSink {
    fn is_connected(&self) -> bool {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.stalled.store(true, Ordering::SeqCst);
            std::thread::sleep(Self::STALL);
        }
        true
    }

    fn publish(&self, _values: &Map<String, Value>) -> Result<(), TelemetryError> {
        Ok(())
    }
}

struct Rig {
    state: Arc<SharedState>,
    store: Arc<MemoryStore>,
    actor: Actor<Coordinator>,
    gateway: EventGateway,
    _dir: TempDir,
}

impl Rig {
    fn new(store: MemoryStore) -> Self {
        Self::build(store, |_| {}, Arc::new(LogSink))
    }

    fn build(
        store: MemoryStore,
        tune: impl FnOnce(&mut VerdantConfig),
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        let mut registry = ActorRegistry::with_builtin();
        registry.register("test.Stubborn", stubborn);

        let dir = TempDir::new().unwrap();
        let state = Arc::new(SharedState::new());
        let store = Arc::new(store);
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_minute(START_MINUTE));
        let mut config = config(dir.path());
        tune(&mut config);
        let coordinator = Coordinator::new(
            config,
            Arc::clone(&state),
            Arc::clone(&store) as Arc<dyn Store>,
            clock,
            registry,
        )
        .with_sink(sink);
        let gateway = coordinator.gateway();
        let mut actor = Actor::new(coordinator);
        actor.spawn().unwrap();
        Self {
            state,
            store,
            actor,
            gateway,
            _dir: dir,
        }
    }

    fn get(&self, subtree: Subtree, path: &[&str]) -> Option<Value> {
        self.state.get(subtree, path)
    }

    fn device_mode(&self) -> Option<Value> {
        self.get(Subtree::Device, &["mode"])
    }

    async fn wait_until(&self, what: &str, check: impl Fn(&Rig) -> bool) {
        for _ in 0..1000 {
            if check(self) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    async fn wait_for_device_mode(&self, mode: &str) {
        self.wait_until(mode, |rig| rig.device_mode() == Some(json!(mode)))
            .await;
    }

    async fn stop(mut self) {
        self.actor.shutdown();
        tokio::time::timeout(Duration::from_secs(2), self.actor.join())
            .await
            .unwrap();
    }
}

fn edu_store() -> MemoryStore {
    MemoryStore::new()
        .with_peripheral_setup(sensor_setup())
        .with_device_config("edu", device("EDU", "d-edu", &[("probe", "s-sim-sensor")]))
        .with_config_pointer("edu")
}

// ─── Boot ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_boots_to_normal_and_starts_children() {
    let rig = Rig::new(edu_store());
    rig.wait_for_device_mode("NORMAL").await;

    assert_eq!(rig.get(Subtree::Device, &["config_name"]), Some(json!("EDU")));
    assert_eq!(rig.get(Subtree::Device, &["config_uuid"]), Some(json!("d-edu")));
    assert_eq!(rig.get(Subtree::Recipe, &["mode"]), Some(json!("NORECIPE")));
    assert_ne!(rig.get(Subtree::Peripherals, &["probe", "mode"]), Some(json!("INIT")));
    for subtree in [Subtree::Network, Subtree::Iot, Subtree::Resource, Subtree::Upgrade] {
        assert_eq!(rig.get(subtree, &["mode"]), Some(json!("NORMAL")), "{subtree}");
    }

    rig.wait_until("a snapshot", |rig| rig.store.snapshot_writes() > 0)
        .await;
    rig.wait_until("an environment record", |rig| {
        !rig.store.environment_records().is_empty()
    })
    .await;
    let snapshot = rig.store.last_snapshot().unwrap();
    assert_eq!(
        snapshot.get(Subtree::Device, &["config_uuid"]),
        Some(&json!("d-edu"))
    );
    rig.stop().await;
}

#[tokio::test]
async fn test_missing_pointer_falls_back_to_unspecified() {
    let rig = Rig::new(MemoryStore::new());
    rig.wait_for_device_mode("NORMAL").await;

    assert_eq!(
        rig.get(Subtree::Device, &["config_name"]),
        Some(json!("unspecified"))
    );
    assert_eq!(
        rig.store.read_config_pointer().unwrap().as_deref(),
        Some("unspecified")
    );
    rig.stop().await;
}

#[tokio::test]
async fn test_unknown_config_goes_to_error() {
    let rig = Rig::new(MemoryStore::new().with_config_pointer("ghost"));
    rig.wait_for_device_mode("ERROR").await;
    assert_eq!(rig.get(Subtree::Device, &["config_uuid"]), None);
    rig.stop().await;
}

#[tokio::test]
async fn test_unresolvable_entries_are_skipped() {
    let store = MemoryStore::new()
        .with_peripheral_setup(setup("s-unknown-class", "missing", "Probe"))
        .with_device_config(
            "edu",
            device(
                "EDU",
                "d-edu",
                &[("orphan", "s-not-there"), ("mystery", "s-unknown-class")],
            ),
        )
        .with_config_pointer("edu");
    let rig = Rig::new(store);
    rig.wait_for_device_mode("NORMAL").await;

    assert_eq!(rig.get(Subtree::Peripherals, &[]), Some(json!({})));
    rig.stop().await;
}

// ─── Snapshot restore ───────────────────────────────────────────────

#[tokio::test]
async fn test_snapshot_resumes_recipe_and_stored_settings() {
    let transitions = verdant_recipe::parse(&basil()).unwrap();
    let snapshot: StateTree = serde_json::from_value(json!({
        "device": { "mode": "NORMAL", "config_uuid": "d-edu" },
        "recipe": {
            "mode": "NORMAL",
            "recipe_uuid": "r-basil",
            "recipe_name": "Basil",
            "start_timestamp_minutes": START_MINUTE - 65,
            "last_update_minute": 10
        },
        "peripherals": {
            "probe": { "mode": "NORMAL", "stored": { "sampling_interval_seconds": 2.0 } }
        }
    }))
    .unwrap();
    let store = edu_store().with_recipe(basil()).with_snapshot(snapshot);
    store.save_recipe_transitions(&transitions).unwrap();

    let rig = Rig::new(store);
    rig.wait_for_device_mode("NORMAL").await;
    rig.wait_until("recipe playback", |rig| {
        rig.get(Subtree::Recipe, &["current_environment_name"]) == Some(json!("Night"))
    })
    .await;

    assert_eq!(rig.get(Subtree::Recipe, &["mode"]), Some(json!("NORMAL")));
    assert_eq!(
        rig.get(Subtree::Environment, &["sensor", "desired", "air_temperature_celsius"]),
        Some(json!(18))
    );
    assert_eq!(
        rig.get(Subtree::Peripherals, &["probe", "stored", "sampling_interval_seconds"]),
        Some(json!(2.0))
    );
    rig.stop().await;
}

// ─── Reconfiguration ────────────────────────────────────────────────

#[tokio::test]
async fn test_load_config_replaces_device_actors() {
    let store = edu_store().with_device_config(
        "lab",
        device("Lab", "d-lab", &[("thermo", "s-sim-sensor")]),
    );
    let rig = Rig::new(store);
    rig.wait_for_device_mode("NORMAL").await;
    assert!(rig.get(Subtree::Peripherals, &["probe"]).is_some());

    let response = rig.gateway.load_device_config(Some("d-lab"));
    assert_eq!(response.status, 200);
    assert_eq!(response.message, "Loading config: lab");

    rig.wait_until("lab config in NORMAL", |rig| {
        rig.get(Subtree::Device, &["config_name"]) == Some(json!("Lab"))
            && rig.device_mode() == Some(json!("NORMAL"))
    })
    .await;
    assert_eq!(rig.get(Subtree::Peripherals, &["probe"]), None);
    assert!(rig.get(Subtree::Peripherals, &["thermo", "mode"]).is_some());
    assert_eq!(rig.store.read_config_pointer().unwrap().as_deref(), Some("lab"));
    rig.stop().await;
}

fn stubborn_store() -> MemoryStore {
    MemoryStore::new()
        .with_peripheral_setup(sensor_setup())
        .with_peripheral_setup(setup("s-stubborn", "test", "Stubborn"))
        .with_device_config("edu", device("EDU", "d-edu", &[("stuck", "s-stubborn")]))
        .with_device_config("lab", device("Lab", "d-lab", &[("thermo", "s-sim-sensor")]))
        .with_config_pointer("edu")
}

#[tokio::test]
async fn test_load_timeout_escalates_and_reset_recovers() {
    let rig = Rig::new(stubborn_store());
    rig.wait_for_device_mode("NORMAL").await;

    let reset = rig.gateway.create_event("device", &json!({ "type": "Reset" }));
    assert_eq!(reset.status, 400);
    assert_eq!(reset.message, "Unable to reset from NORMAL mode");

    assert_eq!(rig.gateway.load_device_config(Some("d-lab")).status, 200);
    rig.wait_for_device_mode("ERROR").await;

    let reset = rig.gateway.create_event("device", &json!({ "type": "Reset" }));
    assert_eq!(reset.status, 200);
    assert_eq!(reset.message, "Resetting");

    rig.wait_until("lab config in NORMAL", |rig| {
        rig.get(Subtree::Device, &["config_name"]) == Some(json!("Lab"))
            && rig.device_mode() == Some(json!("NORMAL"))
    })
    .await;
    assert!(rig.get(Subtree::Peripherals, &["thermo", "mode"]).is_some());
    rig.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_waits_for_old_satellites_before_respawning() {
    let sink = Arc::new(StallingSink::default());
    let rig = Rig::build(
        stubborn_store(),
        |config| config.satellites.iot_interval_s = 0,
        Arc::clone(&sink) as Arc<dyn TelemetrySink>,
    );
    rig.wait_for_device_mode("NORMAL").await;
    assert_eq!(rig.gateway.load_device_config(Some("d-lab")).status, 200);
    rig.wait_for_device_mode("ERROR").await;

    // Hold the running iot satellite inside a poll while the reset lands.
    sink.armed.store(true, Ordering::SeqCst);
    rig.wait_until("iot satellite to stall", |_| sink.stalled.load(Ordering::SeqCst))
        .await;
    let reset = rig.gateway.create_event("device", &json!({ "type": "Reset" }));
    assert_eq!(reset.status, 200);

    rig.wait_until("lab config in NORMAL", |rig| {
        rig.get(Subtree::Device, &["config_name"]) == Some(json!("Lab"))
            && rig.device_mode() == Some(json!("NORMAL"))
            && rig.get(Subtree::Iot, &["mode"]) == Some(json!("NORMAL"))
    })
    .await;
    tokio::time::sleep(StallingSink::STALL + Duration::from_millis(200)).await;
    for subtree in [Subtree::Network, Subtree::Iot, Subtree::Resource, Subtree::Upgrade] {
        assert_eq!(rig.get(subtree, &["mode"]), Some(json!("NORMAL")), "{subtree}");
    }
    rig.stop().await;
}
