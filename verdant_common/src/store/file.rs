//! File-backed store.
//!
//! Layout under the data directory:
//!
//! ```text
//! variables/{sensor,actuator}_variables.json
//! cultivations/{cultivars,cultivation_methods}.json
//! recipes/*.json
//! setups/peripherals/*.json
//! setups/controllers/*.json
//! devices/*.json                 file stem = configuration name
//! config/device.txt              active configuration pointer
//! state/snapshot.json
//! state/environment.jsonl
//! state/recipe_transitions.json
//! ```

use super::schema::{self, SchemaKind};
use super::{ReferenceIndex, ReferenceSummary, Store, StoreError};
use crate::documents::{
    DeviceConfig, EnvironmentRecord, RecipeDocument, RecipeTransition, SetupDescriptor,
};
use crate::state::StateTree;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const SNAPSHOT_FILE: &str = "state/snapshot.json";
const ENVIRONMENT_FILE: &str = "state/environment.jsonl";
const TRANSITIONS_FILE: &str = "state/recipe_transitions.json";
const POINTER_FILE: &str = "config/device.txt";

pub struct FileStore {
    root: PathBuf,
    index: RwLock<ReferenceIndex>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the writable directories.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in ["state", "config"] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|source| StoreError::Io { path, source })?;
        }
        Ok(Self {
            root,
            index: RwLock::new(ReferenceIndex::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Load one document, counting it as rejected on any failure.
    fn load_document<T: DeserializeOwned>(
        &self,
        path: &Path,
        kind: SchemaKind,
        rejected: &mut usize,
    ) -> Option<T> {
        let result = read_json(path).and_then(|value| {
            schema::validate(&value, kind)?;
            Ok(schema::decode::<T>(&value, kind)?)
        });
        match result {
            Ok(document) => Some(document),
            Err(e) => {
                error!("Skipping {}: {}", path.display(), e);
                *rejected += 1;
                None
            }
        }
    }

    /// Load an optional catalog file; a missing file is an empty catalog.
    fn load_catalog<T: DeserializeOwned>(
        &self,
        relative: &str,
        kind: SchemaKind,
        rejected: &mut usize,
    ) -> Vec<T> {
        let path = self.path(relative);
        if !path.exists() {
            debug!("No {} catalog at {}", kind, path.display());
            return Vec::new();
        }
        self.load_document(&path, kind, rejected)
            .unwrap_or_default()
    }

    fn load_setups(
        &self,
        relative: &str,
        kind: SchemaKind,
        rejected: &mut usize,
    ) -> Result<Vec<SetupDescriptor>, StoreError> {
        Ok(json_files(&self.path(relative))?
            .iter()
            .filter_map(|path| self.load_document(path, kind, rejected))
            .collect())
    }
}

impl Store for FileStore {
    fn load_reference_data(&self) -> Result<ReferenceSummary, StoreError> {
        let mut rejected = 0;
        let mut index = ReferenceIndex {
            sensor_variables: self.load_catalog(
                "variables/sensor_variables.json",
                SchemaKind::SensorVariables,
                &mut rejected,
            ),
            actuator_variables: self.load_catalog(
                "variables/actuator_variables.json",
                SchemaKind::ActuatorVariables,
                &mut rejected,
            ),
            cultivars: self.load_catalog(
                "cultivations/cultivars.json",
                SchemaKind::Cultivars,
                &mut rejected,
            ),
            cultivation_methods: self.load_catalog(
                "cultivations/cultivation_methods.json",
                SchemaKind::CultivationMethods,
                &mut rejected,
            ),
            ..ReferenceIndex::default()
        };

        for path in json_files(&self.path("recipes"))? {
            if let Some(recipe) =
                self.load_document::<RecipeDocument>(&path, SchemaKind::Recipe, &mut rejected)
            {
                index.recipes.insert(recipe.uuid.clone(), recipe);
            }
        }
        for setup in self.load_setups("setups/peripherals", SchemaKind::PeripheralSetup, &mut rejected)? {
            index.peripheral_setups.insert(setup.uuid.clone(), setup);
        }
        for setup in self.load_setups("setups/controllers", SchemaKind::ControllerSetup, &mut rejected)? {
            index.controller_setups.insert(setup.uuid.clone(), setup);
        }
        for path in json_files(&self.path("devices"))? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if let Some(config) =
                self.load_document::<DeviceConfig>(&path, SchemaKind::DeviceConfig, &mut rejected)
            {
                index.device_configs.insert(name, config);
            }
        }

        let summary = index.summary(rejected);
        info!(
            "📚 Reference library: {} recipes, {} device configs, {} setups, {} rejected",
            summary.recipes,
            summary.device_configs,
            summary.peripheral_setups + summary.controller_setups,
            summary.rejected
        );
        *self.index.write() = index;
        Ok(summary)
    }

    fn load_device_config(&self, name: &str) -> Result<DeviceConfig, StoreError> {
        if let Some(config) = self.index.read().device_configs.get(name) {
            return Ok(config.clone());
        }
        let path = self.path(&format!("devices/{name}.json"));
        if !path.exists() {
            return Err(StoreError::not_found("device config", name));
        }
        let value = read_json(&path)?;
        schema::validate(&value, SchemaKind::DeviceConfig)?;
        Ok(schema::decode(&value, SchemaKind::DeviceConfig)?)
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
        write_json_atomic(&self.path(SNAPSHOT_FILE), snapshot)
    }

    fn load_snapshot(&self) -> Result<Option<StateTree>, StoreError> {
        let path = self.path(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let value = read_json(&path)?;
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    fn append_environment_record(&self, record: &EnvironmentRecord) -> Result<(), StoreError> {
        let path = self.path(ENVIRONMENT_FILE);
        let line = serde_json::to_string(record).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let io = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io)?;
        writeln!(file, "{line}").map_err(io)
    }

    fn latest_environment_record(&self) -> Result<Option<EnvironmentRecord>, StoreError> {
        let path = self.path(ENVIRONMENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = read_to_string(&path)?;
        let Some(line) = content.lines().rev().find(|l| !l.trim().is_empty()) else {
            return Ok(None);
        };
        serde_json::from_str(line)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    fn save_recipe_transitions(&self, transitions: &[RecipeTransition]) -> Result<(), StoreError> {
        write_json_atomic(&self.path(TRANSITIONS_FILE), &transitions)
    }

    fn load_recipe_transitions(&self) -> Result<Vec<RecipeTransition>, StoreError> {
        let path = self.path(TRANSITIONS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let value = read_json(&path)?;
        serde_json::from_value(value).map_err(|source| StoreError::Json { path, source })
    }

    fn read_config_pointer(&self) -> Result<Option<String>, StoreError> {
        let path = self.path(POINTER_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let name = read_to_string(&path)?.trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    fn write_config_pointer(&self, name: &str) -> Result<(), StoreError> {
        write_atomic(&self.path(POINTER_FILE), format!("{name}\n").as_bytes())
    }
}

fn read_to_string(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Value, StoreError> {
    serde_json::from_str(&read_to_string(path)?).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(io)?;
    fs::rename(&tmp, path).map_err(io)
}

/// `*.json` files of `dir`, sorted; a missing directory is empty.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}
