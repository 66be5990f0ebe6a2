//! The JSON data model.
//!
//! [`Model`] is the root aggregate of a simulation model file. It owns a
//! [`SchemaCatalog`] (types, header, modules, classes) and an [`ObjectGraph`]
//! (globals, objects, schedules, filters); both are flattened into the same
//! top-level JSON object on disk.

mod class;
mod object;
mod property;
mod records;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use class::ClassDef;
pub use object::{ObjectDef, ObjectId};
pub use property::{Access, Keywords, PropertySpec, PROPERTY_SPEC_KEYS, REQUIRED_FLAG};
pub use records::{
    FilterDef, GlobalDef, ModuleDef, FILTER_OPTIONAL_KEYS, FILTER_REQUIRED_KEYS, GLOBAL_KEYS,
};

use crate::error::{ModelResult, ValidationError};
use crate::graph::ObjectGraph;
use crate::schema::SchemaCatalog;

/// Application tag written by the simulation engine.
pub const APPLICATION: &str = "gridlabd";

/// Top-level sections a model file must contain.
pub const REQUIRED_SECTIONS: [&str; 8] = [
    "application",
    "version",
    "types",
    "header",
    "globals",
    "modules",
    "classes",
    "objects",
];

/// A simulation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Application tag.
    pub application: String,

    /// Dotted version string of the engine that wrote the model.
    pub version: String,

    /// Types, header, modules and classes.
    #[serde(flatten)]
    pub schema: SchemaCatalog,

    /// Globals, objects, schedules and filters.
    #[serde(flatten)]
    pub graph: ObjectGraph,

    /// Top-level sections this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Model {
    /// Creates an empty model.
    pub fn new(application: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            version: version.into(),
            schema: SchemaCatalog::default(),
            graph: ObjectGraph::default(),
            extra: BTreeMap::new(),
        }
    }

    /// Parses a model from JSON text.
    pub fn from_json(text: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| ValidationError::InvalidModel {
            reason: format!("malformed JSON: {e}"),
        })?;
        Self::from_value(value)
    }

    /// Builds a model from a parsed JSON value.
    ///
    /// Every section in [`REQUIRED_SECTIONS`] must be present; `schedules`
    /// and `filters` default to empty.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        let Value::Object(map) = &value else {
            return Err(ValidationError::InvalidModel {
                reason: "model is not a JSON object".to_string(),
            }
            .into());
        };
        let missing: Vec<&str> = REQUIRED_SECTIONS
            .iter()
            .copied()
            .filter(|key| !map.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::InvalidModel {
                reason: format!("missing sections: {}", missing.join(", ")),
            }
            .into());
        }

        let mut model: Self =
            serde_json::from_value(value).map_err(|e| ValidationError::InvalidModel {
                reason: e.to_string(),
            })?;
        model.graph.reindex();
        model.check()?;
        Ok(model)
    }

    /// Serializes the model to a JSON value.
    pub fn to_value(&self) -> ModelResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| crate::error::ModelError::internal(format!("serialize model: {e}")))
    }

    /// Serializes the model to pretty JSON.
    pub fn to_json_pretty(&self) -> ModelResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::ModelError::internal(format!("serialize model: {e}")))
    }

    /// Checks model-level invariants: a non-empty application tag and an
    /// acyclic class hierarchy.
    pub fn check(&self) -> ModelResult<()> {
        if self.application.trim().is_empty() {
            return Err(ValidationError::InvalidModel {
                reason: "application tag is empty".to_string(),
            }
            .into());
        }
        for name in self.schema.classes.keys() {
            self.schema.ancestors(name)?;
        }
        Ok(())
    }

    /// Returns the version as its dotted components.
    #[must_use]
    pub fn version_parts(&self) -> Vec<&str> {
        self.version.split('.').collect()
    }
}
