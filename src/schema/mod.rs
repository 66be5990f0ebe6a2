//! Schema catalog: types, object header, modules and classes.
//!
//! Classes form single-parent inheritance chains. Every chain walk keeps a
//! visited set so a cyclic chain surfaces as [`ValidationError::CyclicParent`]
//! instead of looping.

mod import;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{EntityError, EntityKind, ModelResult, ValidationError};
use crate::model::{ClassDef, ModuleDef, PropertySpec, PROPERTY_SPEC_KEYS};
use crate::pattern::select;

/// Type name whose values are references to other objects.
pub const OBJECT_TYPE: &str = "object";

/// Type names whose values are drawn from a keyword table.
pub const KEYWORD_TYPES: [&str; 2] = ["enumeration", "set"];

/// Schema half of a model.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Type catalog: type name to engine type description.
    pub types: BTreeMap<String, Value>,
    /// Built-in object attributes (`id`, `class`, `parent`, ...).
    pub header: BTreeMap<String, PropertySpec>,
    pub modules: BTreeMap<String, ModuleDef>,
    pub classes: BTreeMap<String, ClassDef>,
}

impl SchemaCatalog {
    /// Returns true if the type is in the catalog.
    #[must_use]
    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Looks up a class.
    pub fn class(&self, name: &str) -> Result<&ClassDef, EntityError> {
        self.classes
            .get(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Class, name))
    }

    /// Looks up a module.
    pub fn module(&self, name: &str) -> Result<&ModuleDef, EntityError> {
        self.modules
            .get(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Module, name))
    }

    /// Returns `name` followed by its ancestors, nearest first.
    ///
    /// A chain that ends on a class missing from the catalog stops there.
    pub fn ancestors<'a>(&'a self, name: &str) -> ModelResult<Vec<(&'a str, &'a ClassDef)>> {
        let Some((first, mut current)) = self.classes.get_key_value(name) else {
            return Err(EntityError::not_found(EntityKind::Class, name).into());
        };
        let mut chain = vec![(first.as_str(), current)];
        let mut visited = HashSet::from([first.as_str()]);
        while let Some(parent) = current.parent.as_deref() {
            if !visited.insert(parent) {
                return Err(ValidationError::CyclicParent {
                    class: name.to_string(),
                }
                .into());
            }
            let Some((key, class)) = self.classes.get_key_value(parent) else {
                warn!(class = %name, parent = %parent, "parent chain ends on an undefined class");
                break;
            };
            chain.push((key.as_str(), class));
            current = class;
        }
        Ok(chain)
    }

    /// Collects every property flagged `REQUIRED` along the parent chain.
    pub fn resolve_required_properties(&self, class: &str) -> ModelResult<BTreeSet<String>> {
        Ok(self
            .ancestors(class)?
            .into_iter()
            .flat_map(|(_, c)| c.properties.iter())
            .filter(|(_, spec)| spec.is_required())
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Finds the specification of a property: the header first, then the
    /// class, then its ancestors.
    pub fn property_spec(&self, class: &str, property: &str) -> ModelResult<&PropertySpec> {
        if let Some(spec) = self.header.get(property) {
            return Ok(spec);
        }
        for (_, c) in self.ancestors(class)? {
            if let Some(spec) = c.properties.get(property) {
                return Ok(spec);
            }
        }
        Err(ValidationError::MissingProperty {
            class: class.to_string(),
            property: property.to_string(),
        }
        .into())
    }

    /// Returns the declared type of a property.
    pub fn get_property_type(&self, class: &str, property: &str) -> ModelResult<&str> {
        self.property_spec(class, property)
            .map(|spec| spec.type_name.as_str())
    }

    /// Returns true if `kindof` is `name` or one of its ancestors.
    pub fn isa_class(&self, name: &str, kindof: &str) -> ModelResult<bool> {
        Ok(self.ancestors(name)?.iter().any(|(n, _)| *n == kindof))
    }

    /// Names of the class's own properties matching `pattern`.
    pub fn find_properties(&self, class: &str, pattern: Option<&str>) -> ModelResult<Vec<&str>> {
        let class = self.class(class)?;
        Ok(select(&class.properties, pattern, |_| true)?
            .into_keys()
            .collect())
    }

    /// Types whose name matches `pattern`.
    pub fn get_types(&self, pattern: Option<&str>) -> ModelResult<BTreeMap<&str, &Value>> {
        Ok(select(&self.types, pattern, |_| true)?)
    }

    /// Header attributes whose name matches `pattern`.
    pub fn get_headers(&self, pattern: Option<&str>) -> ModelResult<BTreeMap<&str, &PropertySpec>> {
        Ok(select(&self.header, pattern, |_| true)?)
    }

    /// Modules whose name matches `pattern`.
    pub fn get_modules(&self, pattern: Option<&str>) -> ModelResult<BTreeMap<&str, &ModuleDef>> {
        Ok(select(&self.modules, pattern, |_| true)?)
    }

    /// Classes declared by `module` (any module when `None`) whose name
    /// matches `pattern`.
    pub fn get_classes(
        &self,
        module: Option<&str>,
        pattern: Option<&str>,
    ) -> ModelResult<BTreeMap<&str, &ClassDef>> {
        Ok(select(&self.classes, pattern, |c| {
            module.map_or(true, |m| c.module.as_deref() == Some(m))
        })?)
    }

    /// Validates a class definition against the catalog.
    ///
    /// A referenced module or parent must exist, every property type must be
    /// in the type catalog, and property specs may only use the keys
    /// `type, access, keywords, flags, description`.
    pub fn validate_class_definition(&self, name: &str, def: &ClassDef) -> ModelResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::missing("class name").into());
        }
        if let Some(module) = &def.module {
            self.module(module)?;
        }
        if let Some(parent) = &def.parent {
            if parent == name {
                return Err(ValidationError::CyclicParent {
                    class: name.to_string(),
                }
                .into());
            }
            self.class(parent)?;
        }
        for (property, spec) in &def.properties {
            let field = format!("{name}.{property}");
            if spec.type_name.trim().is_empty() {
                return Err(ValidationError::missing(format!("{field} type")).into());
            }
            if !self.has_type(&spec.type_name) {
                return Err(ValidationError::invalid(
                    field,
                    format!("type '{}' is not defined", spec.type_name),
                )
                .into());
            }
            if let Some(key) = spec.extra.keys().next() {
                return Err(ValidationError::invalid(
                    field,
                    format!(
                        "specification key '{key}' is not allowed; allowed are {}",
                        PROPERTY_SPEC_KEYS.join(", ")
                    ),
                )
                .into());
            }
            if spec.keywords.is_some() && !KEYWORD_TYPES.contains(&spec.type_name.as_str()) {
                return Err(ValidationError::invalid(
                    field,
                    format!("keywords are not allowed on type '{}'", spec.type_name),
                )
                .into());
            }
        }
        Ok(())
    }

    /// Adds a validated class definition.
    pub fn add_class(&mut self, name: &str, def: ClassDef) -> ModelResult<()> {
        if self.classes.contains_key(name) {
            return Err(EntityError::exists(EntityKind::Class, name).into());
        }
        self.validate_class_definition(name, &def)?;
        self.classes.insert(name.to_string(), def);
        Ok(())
    }
}
