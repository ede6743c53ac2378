//! Persistence collaborator.
//!
//! The [`Store`] trait is everything the coordinator and recipe engine need
//! from storage: the reference library, device configurations, snapshots,
//! environment history, compiled recipe transitions and the active
//! configuration pointer. [`FileStore`] keeps them on disk; [`MemoryStore`]
//! keeps them in memory for tests and tooling.

pub mod file;
pub mod memory;
pub mod schema;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use schema::{SchemaError, SchemaKind};

use crate::documents::{
    DeviceConfig, EnvironmentRecord, LibraryEntry, RecipeDocument, RecipeTransition,
    SetupDescriptor, VariableDescriptor,
};
use crate::state::StateTree;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("No {kind} found for '{id}'")]
    NotFound { kind: &'static str, id: String },
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Counts reported after loading the reference library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSummary {
    pub sensor_variables: usize,
    pub actuator_variables: usize,
    pub cultivars: usize,
    pub cultivation_methods: usize,
    pub recipes: usize,
    pub peripheral_setups: usize,
    pub controller_setups: usize,
    pub device_configs: usize,
    /// Documents skipped because they failed to parse or validate.
    pub rejected: usize,
}

/// Storage used by the coordinator and recipe engine.
pub trait Store: Send + Sync {
    /// Load and validate the reference library. Invalid documents are
    /// skipped and counted in [`ReferenceSummary::rejected`].
    fn load_reference_data(&self) -> Result<ReferenceSummary, StoreError>;

    /// Device configuration by name.
    fn load_device_config(&self, name: &str) -> Result<DeviceConfig, StoreError>;

    /// Name of the device configuration with the given uuid.
    fn device_config_name(&self, uuid: &str) -> Option<String>;

    fn peripheral_setup(&self, uuid: &str) -> Option<SetupDescriptor>;

    fn controller_setup(&self, uuid: &str) -> Option<SetupDescriptor>;

    fn load_recipe(&self, uuid: &str) -> Result<RecipeDocument, StoreError>;

    fn recipe_exists(&self, uuid: &str) -> bool;

    fn save_snapshot(&self, snapshot: &StateTree) -> Result<(), StoreError>;

    fn load_snapshot(&self) -> Result<Option<StateTree>, StoreError>;

    fn append_environment_record(&self, record: &EnvironmentRecord) -> Result<(), StoreError>;

    fn latest_environment_record(&self) -> Result<Option<EnvironmentRecord>, StoreError>;

    fn save_recipe_transitions(&self, transitions: &[RecipeTransition]) -> Result<(), StoreError>;

    fn load_recipe_transitions(&self) -> Result<Vec<RecipeTransition>, StoreError>;

    /// Name of the active device configuration, if one was ever written.
    fn read_config_pointer(&self) -> Result<Option<String>, StoreError>;

    fn write_config_pointer(&self, name: &str) -> Result<(), StoreError>;
}

/// In-memory index of the reference library, shared by both stores.
#[derive(Debug, Default, Clone)]
pub struct ReferenceIndex {
    pub sensor_variables: Vec<VariableDescriptor>,
    pub actuator_variables: Vec<VariableDescriptor>,
    pub cultivars: Vec<LibraryEntry>,
    pub cultivation_methods: Vec<LibraryEntry>,
    pub recipes: HashMap<String, RecipeDocument>,
    pub peripheral_setups: HashMap<String, SetupDescriptor>,
    pub controller_setups: HashMap<String, SetupDescriptor>,
    /// Keyed by configuration name.
    pub device_configs: HashMap<String, DeviceConfig>,
}

impl ReferenceIndex {
    pub fn summary(&self, rejected: usize) -> ReferenceSummary {
        ReferenceSummary {
            sensor_variables: self.sensor_variables.len(),
            actuator_variables: self.actuator_variables.len(),
            cultivars: self.cultivars.len(),
            cultivation_methods: self.cultivation_methods.len(),
            recipes: self.recipes.len(),
            peripheral_setups: self.peripheral_setups.len(),
            controller_setups: self.controller_setups.len(),
            device_configs: self.device_configs.len(),
            rejected,
        }
    }

    pub fn device_config_name(&self, uuid: &str) -> Option<String> {
        self.device_configs
            .iter()
            .find(|(_, config)| config.uuid == uuid)
            .map(|(name, _)| name.clone())
    }
}
