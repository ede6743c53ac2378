//! Factory registry for dynamic actors.
//!
//! Maps a setup's `module.class` key to a constructor. The registry is built
//! at startup and handed to the coordinator by value; there is no global
//! table.

use crate::context::DynamicActorContext;
use crate::simulation;
use std::collections::HashMap;
use thiserror::Error;
use verdant_common::actor::ManagedActor;

/// Builds an unspawned actor from its context.
pub type ActorFactory = fn(DynamicActorContext) -> Box<dyn ManagedActor>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("No actor factory registered for '{0}'")]
    FactoryNotFound(String),
}

/// Registry of available actor factories.
pub struct ActorRegistry {
    factories: HashMap<String, ActorFactory>,
}

impl ActorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every actor shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        simulation::register(&mut registry);
        registry
    }

    /// Register a factory under `key`.
    ///
    /// # Panics
    /// Panics if `key` is already registered.
    pub fn register(&mut self, key: &str, factory: ActorFactory) {
        if self.factories.contains_key(key) {
            panic!("Actor factory '{key}' is already registered");
        }
        self.factories.insert(key.to_string(), factory);
    }

    pub fn get_factory(&self, key: &str) -> Option<ActorFactory> {
        self.factories.get(key).copied()
    }

    /// Build the actor described by `context.setup`.
    ///
    /// # Errors
    /// Returns `RegistryError::FactoryNotFound` if the setup's key is unknown.
    pub fn create(&self, context: DynamicActorContext) -> Result<Box<dyn ManagedActor>, RegistryError> {
        let key = context.setup.factory_key();
        let factory = self
            .get_factory(&key)
            .ok_or(RegistryError::FactoryNotFound(key))?;
        Ok(factory(context))
    }

    /// Registered keys, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ActorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActorKind, BusLock};
    use serde_json::Map;
    use std::sync::Arc;
    use std::time::Duration;
    use verdant_common::actor::ActorError;
    use verdant_common::documents::{ActorConfig, SetupDescriptor};
    use verdant_common::state::SharedState;

    struct Inert {
        name: String,
    }

    impl ManagedActor for Inert {
        fn name(&self) -> &str {
            &self.name
        }

        fn spawn(&mut self) -> Result<(), ActorError> {
            Ok(())
        }

        fn shutdown(&self) {}

        fn reset(&self) {}

        fn mode(&self) -> &'static str {
            "INIT"
        }

        fn has_left_init(&self) -> bool {
            false
        }

        fn is_terminated(&self) -> bool {
            false
        }
    }

    fn inert(context: DynamicActorContext) -> Box<dyn ManagedActor> {
        Box::new(Inert {
            name: context.name().to_string(),
        })
    }

    fn context(module: &str, class: &str) -> DynamicActorContext {
        DynamicActorContext {
            kind: ActorKind::Peripheral,
            config: ActorConfig {
                name: "probe".into(),
                uuid: "s-1".into(),
                parameters: Map::new(),
            },
            setup: SetupDescriptor {
                uuid: "s-1".into(),
                name: "Probe".into(),
                module_name: module.into(),
                class_name: class.into(),
                properties: Map::new(),
            },
            state: Arc::new(SharedState::new()),
            bus: BusLock::new(),
            simulate: true,
            tick: Duration::from_millis(10),
        }
    }

    #[test]
    fn registry_register_and_create() {
        let mut registry = ActorRegistry::new();
        registry.register("test.Inert", inert);

        let actor = registry.create(context("test", "Inert")).unwrap();
        assert_eq!(actor.name(), "probe");
    }

    #[test]
    fn registry_factory_not_found() {
        let registry = ActorRegistry::new();
        let result = registry.create(context("nowhere", "Nothing"));
        assert_eq!(
            result.err(),
            Some(RegistryError::FactoryNotFound("nowhere.Nothing".into()))
        );
    }

    #[test]
    fn registry_lists_sorted_keys() {
        let mut registry = ActorRegistry::new();
        registry.register("beta.B", inert);
        registry.register("alpha.A", inert);
        assert_eq!(registry.list(), vec!["alpha.A", "beta.B"]);
    }

    #[test]
    fn builtin_registry_has_simulation_actors() {
        let registry = ActorRegistry::with_builtin();
        assert!(registry.get_factory("simulation.SimulatedSensor").is_some());
        assert!(registry.get_factory("simulation.SetpointRelay").is_some());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_duplicate_panics() {
        let mut registry = ActorRegistry::new();
        registry.register("dup.Dup", inert);
        registry.register("dup.Dup", inert);
    }
}
