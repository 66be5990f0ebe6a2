//! Object records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine-assigned object identifier.
pub type ObjectId = u64;

/// A named instance of a class with concrete property values.
///
/// The object's name is the key it is stored under; `class` and `id` are the
/// well-known fields and everything else is the string property bag.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct ObjectDef {
    pub class: String,
    pub id: ObjectId,
    pub properties: BTreeMap<String, String>,
}

impl ObjectDef {
    /// Returns a property value.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }
}

fn parse_id(value: &Value) -> Result<ObjectId, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("object id {n} is not a non-negative integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("object id '{s}' is not a non-negative integer")),
        other => Err(format!("object id must be a string or number, found {other}")),
    }
}

impl TryFrom<BTreeMap<String, Value>> for ObjectDef {
    type Error = String;

    fn try_from(mut map: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let class = match map.remove("class") {
            Some(Value::String(s)) => s,
            Some(other) => return Err(format!("object class must be a string, found {other}")),
            None => return Err("object does not specify a class".to_string()),
        };
        let id = parse_id(&map.remove("id").ok_or("object does not have an id")?)?;

        let mut properties = BTreeMap::new();
        for (key, value) in map {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => return Err(format!("object property '{key}' is not a scalar: {other}")),
            };
            properties.insert(key, value);
        }
        Ok(Self {
            class,
            id,
            properties,
        })
    }
}

impl From<ObjectDef> for BTreeMap<String, Value> {
    fn from(object: ObjectDef) -> Self {
        let mut map: Self = object
            .properties
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        map.insert("class".to_string(), Value::String(object.class));
        map.insert("id".to_string(), Value::String(object.id.to_string()));
        map
    }
}
