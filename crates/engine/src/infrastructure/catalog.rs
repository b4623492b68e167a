//! Authored content definitions: event templates and instance definitions.
//!
//! The catalog is read once at startup. Instance type names are resolved
//! into [`InstanceType`] here so the rest of the engine never handles raw
//! strings.

use std::collections::HashMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use timegate_domain::{EventDefId, InstanceDefId, InstanceType};

/// Path of the JSON catalog file. Optional; an unset path means an empty catalog.
pub const CATALOG_PATH_VAR: &str = "TIMEGATE_CATALOG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate {kind} definition: {id}")]
    Duplicate { kind: &'static str, id: u32 },
    #[error("Invalid {kind} definition {id}: {reason}")]
    Invalid {
        kind: &'static str,
        id: u32,
        reason: String,
    },
}

/// Template for a public world event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDefinition {
    pub id: EventDefId,
    pub name: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub initial_phase: u32,
}

impl EventDefinition {
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDefinition {
    pub id: InstanceDefId,
    pub name: String,
    pub instance_type: InstanceType,
    /// Type name as authored, kept for diagnostics
    pub raw_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceRecord {
    id: InstanceDefId,
    name: String,
    #[serde(rename = "type")]
    instance_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFile {
    events: Vec<EventDefinition>,
    instances: Vec<InstanceRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentCatalog {
    events: HashMap<EventDefId, EventDefinition>,
    instances: HashMap<InstanceDefId, InstanceDefinition>,
}

impl ContentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for event in file.events {
            catalog.insert_event(event)?;
        }
        for record in file.instances {
            catalog.insert_instance(record.id, record.name, &record.instance_type)?;
        }
        tracing::info!(
            events = catalog.events.len(),
            instances = catalog.instances.len(),
            "Content catalog loaded"
        );
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn from_env() -> Result<Self, CatalogError> {
        match std::env::var(CATALOG_PATH_VAR) {
            Ok(path) => Self::load(Path::new(&path)),
            Err(_) => {
                tracing::warn!("{CATALOG_PATH_VAR} not set, starting with an empty catalog");
                Ok(Self::new())
            }
        }
    }

    pub fn insert_event(&mut self, event: EventDefinition) -> Result<(), CatalogError> {
        if event.duration_minutes == 0 {
            return Err(CatalogError::Invalid {
                kind: "event",
                id: event.id.get(),
                reason: "duration must be positive".into(),
            });
        }
        if self.events.contains_key(&event.id) {
            return Err(CatalogError::Duplicate {
                kind: "event",
                id: event.id.get(),
            });
        }
        self.events.insert(event.id, event);
        Ok(())
    }

    /// Unknown type names are accepted as `Unrecognized` and reported.
    pub fn insert_instance(
        &mut self,
        id: InstanceDefId,
        name: impl Into<String>,
        raw_type: &str,
    ) -> Result<(), CatalogError> {
        if self.instances.contains_key(&id) {
            return Err(CatalogError::Duplicate {
                kind: "instance",
                id: id.get(),
            });
        }
        let instance_type = InstanceType::parse(raw_type);
        if !instance_type.is_recognized() {
            tracing::warn!(
                instance_def = %id,
                raw_type,
                "Unrecognized instance type, lockouts will fall back to the daily reset"
            );
        }
        self.instances.insert(
            id,
            InstanceDefinition {
                id,
                name: name.into(),
                instance_type,
                raw_type: raw_type.to_string(),
            },
        );
        Ok(())
    }

    pub fn with_event(mut self, event: EventDefinition) -> Result<Self, CatalogError> {
        self.insert_event(event)?;
        Ok(self)
    }

    pub fn with_instance(
        mut self,
        id: InstanceDefId,
        name: impl Into<String>,
        raw_type: &str,
    ) -> Result<Self, CatalogError> {
        self.insert_instance(id, name, raw_type)?;
        Ok(self)
    }

    pub fn event(&self, id: EventDefId) -> Option<&EventDefinition> {
        self.events.get(&id)
    }

    pub fn instance(&self, id: InstanceDefId) -> Option<&InstanceDefinition> {
        self.instances.get(&id)
    }

    pub fn instance_type(&self, id: InstanceDefId) -> Option<InstanceType> {
        self.instances.get(&id).map(|i| i.instance_type)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}
