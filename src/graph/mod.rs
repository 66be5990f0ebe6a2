//! Object graph: globals, objects, schedules and filters.
//!
//! Every insertion validates against the [`SchemaCatalog`] before touching
//! the collections, so a rejected call leaves the graph unchanged.

mod globals;

pub use globals::{check_global, DEFAULT_GLOBAL_TYPE};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EntityError, EntityKind, ModelResult, ValidationError};
use crate::model::{FilterDef, GlobalDef, ObjectDef, ObjectId};
use crate::pattern::select;
use crate::schema::{SchemaCatalog, OBJECT_TYPE};

/// Header attribute holding an object's identifier.
pub const ID_PROPERTY: &str = "id";

/// Header attribute holding an object's class.
pub const CLASS_PROPERTY: &str = "class";

/// Instance half of a model.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectGraph {
    pub globals: BTreeMap<String, GlobalDef>,
    pub objects: BTreeMap<String, ObjectDef>,
    #[serde(default)]
    pub schedules: BTreeMap<String, String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterDef>,

    /// Next identifier handed out by [`ObjectGraph::add_object`]. Never
    /// decreases, so identifiers and synthesized names are not reused.
    #[serde(skip)]
    next_id: ObjectId,
}

impl PartialEq for ObjectGraph {
    fn eq(&self, other: &Self) -> bool {
        self.globals == other.globals
            && self.objects == other.objects
            && self.schedules == other.schedules
            && self.filters == other.filters
    }
}

/// Name and identifier of a newly inserted object.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub name: String,
    pub id: ObjectId,
}

impl ObjectGraph {
    /// Identifier the next inserted object will receive.
    #[must_use]
    pub const fn next_id(&self) -> ObjectId {
        self.next_id
    }

    /// Recomputes the identifier counter from the loaded objects.
    pub fn reindex(&mut self) {
        let after_max = self.objects.values().map(|o| o.id + 1).max().unwrap_or(0);
        let count = self.objects.len() as ObjectId;
        self.next_id = self.next_id.max(after_max).max(count);
    }

    /// Looks up an object.
    pub fn object(&self, name: &str) -> Result<&ObjectDef, EntityError> {
        self.objects
            .get(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Object, name))
    }

    /// Objects of any of `classes` (all classes when `None`) whose name
    /// matches `pattern`.
    pub fn get_objects(
        &self,
        classes: Option<&[&str]>,
        pattern: Option<&str>,
    ) -> ModelResult<BTreeMap<&str, &ObjectDef>> {
        Ok(select(&self.objects, pattern, |o| {
            classes.map_or(true, |cs| cs.contains(&o.class.as_str()))
        })?)
    }

    /// Looks up a schedule definition.
    pub fn schedule(&self, name: &str) -> Result<&str, EntityError> {
        self.schedules
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| EntityError::not_found(EntityKind::Schedule, name))
    }

    /// Schedules whose name matches `pattern`.
    pub fn get_schedules(&self, pattern: Option<&str>) -> ModelResult<BTreeMap<&str, &String>> {
        Ok(select(&self.schedules, pattern, |_| true)?)
    }

    /// Looks up a filter.
    pub fn filter(&self, name: &str) -> Result<&FilterDef, EntityError> {
        self.filters
            .get(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Filter, name))
    }

    /// Filters whose name matches `pattern`.
    pub fn get_filters(&self, pattern: Option<&str>) -> ModelResult<BTreeMap<&str, &FilterDef>> {
        Ok(select(&self.filters, pattern, |_| true)?)
    }

    /// Inserts an object of `class`.
    ///
    /// Without a `name` the object is named `<class>:<id>`. A caller-supplied
    /// `id` property is dropped with a warning. Every required property of
    /// the class chain must be supplied; all missing keys are reported at
    /// once.
    pub fn add_object(
        &mut self,
        schema: &SchemaCatalog,
        class: &str,
        name: Option<&str>,
        mut properties: BTreeMap<String, String>,
    ) -> ModelResult<ObjectHandle> {
        schema.class(class)?;

        if let Some(id) = properties.remove(ID_PROPERTY) {
            warn!(class = %class, id = %id, "object id is engine-assigned; ignoring supplied id");
        }
        if let Some(declared) = properties.remove(CLASS_PROPERTY) {
            if declared != class {
                return Err(ValidationError::invalid(
                    CLASS_PROPERTY,
                    format!("'{declared}' does not match class '{class}'"),
                )
                .into());
            }
        }

        let id = self.next_id;
        let name = match name {
            Some(n) if n.trim().is_empty() => {
                return Err(ValidationError::missing("object name").into());
            }
            Some(n) => n.to_string(),
            None => format!("{class}:{id}"),
        };
        if self.objects.contains_key(&name) {
            return Err(EntityError::exists(EntityKind::Object, name).into());
        }

        let missing: Vec<String> = schema
            .resolve_required_properties(class)?
            .into_iter()
            .filter(|key| !properties.contains_key(key))
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequiredProperty {
                class: class.to_string(),
                missing,
            }
            .into());
        }

        for (property, value) in &properties {
            if is_reference(schema, class, property) {
                self.check_reference(property, value)?;
            }
        }

        self.objects.insert(
            name.clone(),
            ObjectDef {
                class: class.to_string(),
                id,
                properties,
            },
        );
        self.next_id = id + 1;
        debug!(object = %name, class = %class, id, "object added");
        Ok(ObjectHandle { name, id })
    }

    /// Sets properties of an existing object.
    ///
    /// Every key must be a property of the object's class chain (or the
    /// header); `id` and `class` cannot be changed.
    pub fn update_object(
        &mut self,
        schema: &SchemaCatalog,
        name: &str,
        properties: BTreeMap<String, String>,
    ) -> ModelResult<()> {
        let class = self.object(name)?.class.clone();
        for (property, value) in &properties {
            if property == ID_PROPERTY || property == CLASS_PROPERTY {
                return Err(ValidationError::invalid(
                    property.as_str(),
                    format!("'{property}' of object '{name}' cannot be updated"),
                )
                .into());
            }
            if schema.get_property_type(&class, property)? == OBJECT_TYPE {
                if value == name {
                    return Err(ValidationError::invalid(
                        property.as_str(),
                        format!("object '{name}' cannot refer to itself"),
                    )
                    .into());
                }
                self.check_reference(property, value)?;
            }
        }

        let object = self
            .objects
            .get_mut(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Object, name))?;
        object.properties.extend(properties);
        debug!(object = %name, "object updated");
        Ok(())
    }

    /// Adds a schedule.
    pub fn add_schedule(&mut self, name: &str, definition: impl Into<String>) -> ModelResult<()> {
        let definition = definition.into();
        if name.trim().is_empty() {
            return Err(ValidationError::missing("schedule name").into());
        }
        if self.schedules.contains_key(name) {
            return Err(EntityError::exists(EntityKind::Schedule, name).into());
        }
        if definition.trim().is_empty() {
            return Err(ValidationError::missing(format!("schedule '{name}' definition")).into());
        }
        self.schedules.insert(name.to_string(), definition);
        debug!(schedule = %name, "schedule added");
        Ok(())
    }

    /// Adds a filter.
    pub fn add_filter(&mut self, name: &str, filter: FilterDef) -> ModelResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::missing("filter name").into());
        }
        if self.filters.contains_key(name) {
            return Err(EntityError::exists(EntityKind::Filter, name).into());
        }
        self.filters.insert(name.to_string(), filter);
        debug!(filter = %name, "filter added");
        Ok(())
    }

    /// A non-empty reference value must name an existing object.
    fn check_reference(&self, property: &str, value: &str) -> ModelResult<()> {
        if value.is_empty() || self.objects.contains_key(value) {
            return Ok(());
        }
        debug!(property = %property, target = %value, "reference to undefined object");
        Err(EntityError::not_found(EntityKind::Object, value).into())
    }
}

/// Returns true if `property` of `class` is declared with the object type.
/// Properties the schema does not know are not references.
pub(crate) fn is_reference(schema: &SchemaCatalog, class: &str, property: &str) -> bool {
    schema
        .get_property_type(class, property)
        .is_ok_and(|t| t == OBJECT_TYPE)
}
