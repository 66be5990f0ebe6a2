//! Property specifications shared by class definitions and the object header.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Keyword table of a `set` or `enumeration` type: keyword name to encoded value.
pub type Keywords = BTreeMap<String, Value>;

/// Flag token marking a property that every object must supply.
pub const REQUIRED_FLAG: &str = "REQUIRED";

/// Keys a user-supplied property specification may carry.
pub const PROPERTY_SPEC_KEYS: [&str; 5] = ["type", "access", "keywords", "flags", "description"];

/// Property access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Access {
    #[default]
    Public,
    Private,
    Protected,
    Hidden,
    Reference,
}

impl Access {
    /// Canonical upper-case spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
            Self::Protected => "PROTECTED",
            Self::Hidden => "HIDDEN",
            Self::Reference => "REFERENCE",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Access {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(Self::Public),
            "PRIVATE" => Ok(Self::Private),
            "PROTECTED" => Ok(Self::Protected),
            "HIDDEN" => Ok(Self::Hidden),
            "REFERENCE" => Ok(Self::Reference),
            other => Err(ValidationError::invalid(
                "access",
                format!("'{other}' is not one of PUBLIC|PRIVATE|PROTECTED|HIDDEN|REFERENCE"),
            )),
        }
    }
}

/// Specification of one property of a class (or of the object header).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Type name; must exist in the type catalog.
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,

    /// Pipe-delimited flag tokens, e.g. `REQUIRED|OUTPUT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Keywords>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Engine-provided attributes outside the editable key set (unit, default, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PropertySpec {
    /// Creates a bare specification of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            access: None,
            flags: None,
            keywords: None,
            description: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the flag string.
    #[must_use]
    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = Some(flags.into());
        self
    }

    /// Sets the access level.
    #[must_use]
    pub const fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    /// Sets the keyword table.
    #[must_use]
    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = Some(keywords);
        self
    }

    /// Iterates the flag tokens.
    pub fn flag_tokens(&self) -> impl Iterator<Item = &str> {
        self.flags
            .as_deref()
            .unwrap_or_default()
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Returns true if the flag token is set.
    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flag_tokens().any(|t| t == flag)
    }

    /// Returns true if objects must supply this property.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.has_flag(REQUIRED_FLAG)
    }
}

impl From<PropertySpec> for Value {
    fn from(spec: PropertySpec) -> Self {
        let mut map = serde_json::Map::new();
        map.insert("type".to_string(), Value::String(spec.type_name));
        if let Some(access) = spec.access {
            map.insert("access".to_string(), Value::String(access.as_str().to_string()));
        }
        if let Some(flags) = spec.flags {
            map.insert("flags".to_string(), Value::String(flags));
        }
        if let Some(keywords) = spec.keywords {
            map.insert("keywords".to_string(), Value::Object(keywords.into_iter().collect()));
        }
        if let Some(description) = spec.description {
            map.insert("description".to_string(), Value::String(description));
        }
        map.extend(spec.extra);
        Value::Object(map)
    }
}

/// Deserializes a JSON string or number into its string form.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_split_on_pipe() {
        let spec = PropertySpec::new("set").with_flags("OUTPUT| REQUIRED");
        assert!(spec.is_required());
        assert!(spec.has_flag("OUTPUT"));
        assert!(!spec.has_flag("CHARSET"));
        assert_eq!(spec.flag_tokens().count(), 2);
    }

    #[test]
    fn test_spec_keeps_engine_attributes() {
        let json = r#"{"type":"double","access":"PUBLIC","unit":"V","default":"120 V"}"#;
        let spec: PropertySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.access, Some(Access::Public));
        assert_eq!(spec.extra.len(), 2);
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(json).unwrap());
    }

    #[test]
    fn test_spec_into_value_matches_serde() {
        let keywords: Keywords = [("A".to_string(), Value::from(1)), ("B".to_string(), Value::from(2))]
            .into_iter()
            .collect();
        let mut spec = PropertySpec::new("set")
            .with_flags("REQUIRED")
            .with_access(Access::Protected)
            .with_keywords(keywords);
        spec.description = Some("phases present".to_string());
        spec.extra.insert("unit".to_string(), Value::from("V"));

        let expected = serde_json::to_value(&spec).unwrap();
        assert_eq!(Value::from(spec), expected);
    }

    #[test]
    fn test_access_parse() {
        assert_eq!("reference".parse::<Access>().unwrap(), Access::Reference);
        assert!("SECRET".parse::<Access>().is_err());
    }
}
