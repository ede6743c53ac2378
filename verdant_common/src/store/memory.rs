//! In-memory store.

use super::{ReferenceIndex, ReferenceSummary, Store, StoreError};
use crate::documents::{
    DeviceConfig, EnvironmentRecord, RecipeDocument, RecipeTransition, SetupDescriptor,
};
use crate::state::StateTree;
use parking_lot::{Mutex, RwLock};

/// Volatile [`Store`] populated through builder methods.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<ReferenceIndex>,
    snapshot: Mutex<Option<StateTree>>,
    environment: Mutex<Vec<EnvironmentRecord>>,
    transitions: Mutex<Vec<RecipeTransition>>,
    pointer: Mutex<Option<String>>,
    snapshot_writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipe(self, recipe: RecipeDocument) -> Self {
        self.index.write().recipes.insert(recipe.uuid.clone(), recipe);
        self
    }

    pub fn with_device_config(self, name: &str, config: DeviceConfig) -> Self {
        self.index
            .write()
            .device_configs
            .insert(name.to_string(), config);
        self
    }

    pub fn with_peripheral_setup(self, setup: SetupDescriptor) -> Self {
        self.index
            .write()
            .peripheral_setups
            .insert(setup.uuid.clone(), setup);
        self
    }

    pub fn with_controller_setup(self, setup: SetupDescriptor) -> Self {
        self.index
            .write()
            .controller_setups
            .insert(setup.uuid.clone(), setup);
        self
    }

    pub fn with_snapshot(self, snapshot: StateTree) -> Self {
        *self.snapshot.lock() = Some(snapshot);
        self
    }

    pub fn with_config_pointer(self, name: &str) -> Self {
        *self.pointer.lock() = Some(name.to_string());
        self
    }

    /// Last snapshot written, if any.
    pub fn last_snapshot(&self) -> Option<StateTree> {
        self.snapshot.lock().clone()
    }

    pub fn snapshot_writes(&self) -> usize {
        *self.snapshot_writes.lock()
    }

    pub fn environment_records(&self) -> Vec<EnvironmentRecord> {
        self.environment.lock().clone()
    }
}

impl Store for MemoryStore {
    fn load_reference_data(&self) -> Result<ReferenceSummary, StoreError> {
        Ok(self.index.read().summary(0))
    }

    fn load_device_config(&self, name: &str) -> Result<DeviceConfig, StoreError> {
        self.index
            .read()
            .device_configs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("device config", name))
    }

    fn device_config_name(&self, uuid: &str) -> Option<String> {
        self.index.read().device_config_name(uuid)
    }

    fn peripheral_setup(&self, uuid: &str) -> Option<SetupDescriptor> {
        self.index.read().peripheral_setups.get(uuid).cloned()
    }

    fn controller_setup(&self, uuid: &str) -> Option<SetupDescriptor> {
        self.index.read().controller_setups.get(uuid).cloned()
    }

    fn load_recipe(&self, uuid: &str) -> Result<RecipeDocument, StoreError> {
        self.index
            .read()
            .recipes
            .get(uuid)
            .cloned()
            .ok_or_else(|| StoreError::not_found("recipe", uuid))
    }

    fn recipe_exists(&self, uuid: &str) -> bool {
        self.index.read().recipes.contains_key(uuid)
    }

    fn save_snapshot(&self, snapshot: &StateTree) -> Result<(), StoreError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.snapshot_writes.lock() += 1;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<StateTree>, StoreError> {
        Ok(self.snapshot.lock().clone())
    }

    fn append_environment_record(&self, record: &EnvironmentRecord) -> Result<(), StoreError> {
        self.environment.lock().push(record.clone());
        Ok(())
    }

    fn latest_environment_record(&self) -> Result<Option<EnvironmentRecord>, StoreError> {
        Ok(self.environment.lock().last().cloned())
    }

    fn save_recipe_transitions(&self, transitions: &[RecipeTransition]) -> Result<(), StoreError> {
        *self.transitions.lock() = transitions.to_vec();
        Ok(())
    }

    fn load_recipe_transitions(&self) -> Result<Vec<RecipeTransition>, StoreError> {
        Ok(self.transitions.lock().clone())
    }

    fn read_config_pointer(&self) -> Result<Option<String>, StoreError> {
        Ok(self.pointer.lock().clone())
    }

    fn write_config_pointer(&self, name: &str) -> Result<(), StoreError> {
        *self.pointer.lock() = Some(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_populates_index() {
        let store = MemoryStore::new()
            .with_device_config("edu", DeviceConfig::empty("EDU", "d-edu"))
            .with_config_pointer("edu");

        let summary = store.load_reference_data().unwrap();
        assert_eq!(summary.device_configs, 1);
        assert_eq!(store.device_config_name("d-edu").as_deref(), Some("edu"));
        assert_eq!(store.read_config_pointer().unwrap().as_deref(), Some("edu"));
        assert!(store.load_device_config("other").is_err());
    }

    #[test]
    fn snapshot_writes_are_counted() {
        let store = MemoryStore::new();
        store.save_snapshot(&StateTree::default()).unwrap();
        store.save_snapshot(&StateTree::default()).unwrap();
        assert_eq!(store.snapshot_writes(), 2);
        assert!(store.last_snapshot().is_some());
    }
}
