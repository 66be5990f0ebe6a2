//! Module, global and filter records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::property::{string_or_number, Access, Keywords};
use crate::error::ValidationError;

/// A module loaded from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDef {
    #[serde(deserialize_with = "string_or_number")]
    pub major: String,
    #[serde(deserialize_with = "string_or_number")]
    pub minor: String,
    /// Opaque engine metadata.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ModuleDef {
    /// Creates a module record with the given version.
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Returns the `major.minor` version string.
    #[must_use]
    pub fn version(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

/// Keys a global definition may carry.
pub const GLOBAL_KEYS: [&str; 4] = ["type", "keywords", "access", "value"];

/// A global variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalDef {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub access: Access,

    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Keywords>,

    /// Engine attributes outside the editable key set.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GlobalDef {
    /// Creates a global of the given type and value.
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            access: Access::Public,
            value: value.into(),
            keywords: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the access level.
    #[must_use]
    pub const fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Sets the keyword table.
    #[must_use]
    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = Some(keywords);
        self
    }
}

/// Keys every filter must define.
pub const FILTER_REQUIRED_KEYS: [&str; 4] = ["domain", "timestep", "numerator", "denominator"];

/// Keys a filter may define in addition to the required ones.
pub const FILTER_OPTIONAL_KEYS: [&str; 4] = ["timeskew", "resolution", "minimum", "maximum"];

/// A discrete-time transfer function filter.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterDef {
    pub domain: Value,
    pub timestep: Value,
    pub numerator: Value,
    pub denominator: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeskew: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
}

impl FilterDef {
    /// Builds a filter from its keyed fields, checking the key set first.
    pub fn from_fields(
        name: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<Self, ValidationError> {
        for key in FILTER_REQUIRED_KEYS {
            if !fields.contains_key(key) {
                return Err(ValidationError::missing(format!("filter '{name}' {key}")));
            }
        }
        for key in fields.keys() {
            if !FILTER_REQUIRED_KEYS.contains(&key.as_str())
                && !FILTER_OPTIONAL_KEYS.contains(&key.as_str())
            {
                return Err(ValidationError::invalid(
                    format!("filter '{name}'"),
                    format!("key '{key}' is not recognized"),
                ));
            }
        }
        let map: serde_json::Map<String, Value> = fields.into_iter().collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| ValidationError::invalid(format!("filter '{name}'"), e.to_string()))
    }
}
