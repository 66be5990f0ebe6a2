//! Class definitions.
//!
//! In the model file a class is one JSON map mixing scalar metadata
//! (`module`, `parent`, `object_size`, ...) with property specifications.
//! [`ClassDef`] splits the two apart and reassembles them on save.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::property::PropertySpec;

/// A named schema for objects, with an optional single parent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct ClassDef {
    /// Module that declared this class, if any.
    pub module: Option<String>,
    /// Parent class name, if any.
    pub parent: Option<String>,
    /// Own (non-inherited) property specifications.
    pub properties: BTreeMap<String, PropertySpec>,
    /// Opaque scalar metadata carried through unchanged.
    pub metadata: BTreeMap<String, Value>,
}

impl ClassDef {
    /// Creates an empty class definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the declaring module.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Sets the parent class.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds a property specification.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }
}

impl TryFrom<BTreeMap<String, Value>> for ClassDef {
    type Error = String;

    fn try_from(map: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut class = Self::new();
        for (key, value) in map {
            match (key.as_str(), value) {
                ("module", Value::String(s)) => class.module = Some(s),
                ("parent", Value::String(s)) => class.parent = Some(s),
                ("module" | "parent", other) => {
                    return Err(format!("class '{key}' must be a string, found {other}"));
                }
                (_, Value::Object(obj)) if obj.contains_key("type") => {
                    let spec = serde_json::from_value(Value::Object(obj))
                        .map_err(|e| format!("property '{key}': {e}"))?;
                    class.properties.insert(key, spec);
                }
                (_, other) => {
                    class.metadata.insert(key, other);
                }
            }
        }
        Ok(class)
    }
}

impl From<ClassDef> for BTreeMap<String, Value> {
    fn from(class: ClassDef) -> Self {
        let mut map = class.metadata;
        if let Some(module) = class.module {
            map.insert("module".to_string(), Value::String(module));
        }
        if let Some(parent) = class.parent {
            map.insert("parent".to_string(), Value::String(parent));
        }
        for (name, spec) in class.properties {
            map.insert(name, Value::from(spec));
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_class_splits_metadata_and_properties() {
        let raw = json!({
            "object_size": "1024",
            "module": "powerflow",
            "parent": "powerflow_object",
            "phases": {"type": "set", "flags": "REQUIRED"},
            "voltage_A": {"type": "complex", "access": "PUBLIC", "unit": "V"},
        });
        let class: ClassDef = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(class.module.as_deref(), Some("powerflow"));
        assert_eq!(class.parent.as_deref(), Some("powerflow_object"));
        assert_eq!(class.properties.len(), 2);
        assert!(class.properties["phases"].is_required());
        assert_eq!(class.metadata["object_size"], json!("1024"));

        assert_eq!(serde_json::to_value(&class).unwrap(), raw);
    }

    #[test]
    fn test_class_rejects_non_string_parent() {
        let raw = json!({"parent": 3});
        assert!(serde_json::from_value::<ClassDef>(raw).is_err());
    }
}
