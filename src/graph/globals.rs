//! Global variables.

use std::collections::BTreeMap;

use tracing::debug;

use super::ObjectGraph;
use crate::error::{EntityError, EntityKind, ModelResult, ValidationError};
use crate::model::{GlobalDef, GLOBAL_KEYS};
use crate::pattern::select;
use crate::schema::{SchemaCatalog, KEYWORD_TYPES};

/// Type given to globals created without one.
pub const DEFAULT_GLOBAL_TYPE: &str = "char1024";

impl ObjectGraph {
    /// Looks up a global.
    pub fn global(&self, name: &str) -> Result<&GlobalDef, EntityError> {
        self.globals
            .get(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Global, name))
    }

    /// Globals whose name matches `pattern`.
    pub fn get_globals(&self, pattern: Option<&str>) -> ModelResult<BTreeMap<&str, &GlobalDef>> {
        Ok(select(&self.globals, pattern, |_| true)?)
    }

    /// Adds a global.
    pub fn add_global(
        &mut self,
        schema: &SchemaCatalog,
        name: &str,
        global: GlobalDef,
    ) -> ModelResult<()> {
        if name.trim().is_empty() {
            return Err(ValidationError::missing("global name").into());
        }
        if self.globals.contains_key(name) {
            return Err(EntityError::exists(EntityKind::Global, name).into());
        }
        if let Some(key) = global.extra.keys().next() {
            return Err(ValidationError::invalid(
                format!("global '{name}'"),
                format!("data item '{key}' is invalid; allowed are {}", GLOBAL_KEYS.join(", ")),
            )
            .into());
        }
        check_global(schema, name, &global)?;
        self.globals.insert(name.to_string(), global);
        debug!(global = %name, "global added");
        Ok(())
    }

    /// Changes the value of an existing global.
    pub fn update_global(
        &mut self,
        schema: &SchemaCatalog,
        name: &str,
        value: impl Into<String>,
    ) -> ModelResult<()> {
        let mut updated = self.global(name)?.clone();
        updated.value = value.into();
        check_global(schema, name, &updated)?;
        self.globals.insert(name.to_string(), updated);
        debug!(global = %name, "global updated");
        Ok(())
    }

    /// Removes a global.
    pub fn delete_global(&mut self, name: &str) -> ModelResult<GlobalDef> {
        let removed = self
            .globals
            .remove(name)
            .ok_or_else(|| EntityError::not_found(EntityKind::Global, name))?;
        debug!(global = %name, "global deleted");
        Ok(removed)
    }
}

/// Validates a global definition: known type, and for keyword types a value
/// drawn from the keyword table.
pub fn check_global(schema: &SchemaCatalog, name: &str, global: &GlobalDef) -> ModelResult<()> {
    if !schema.has_type(&global.type_name) {
        return Err(ValidationError::invalid(
            format!("global '{name}'"),
            format!("type '{}' is not defined", global.type_name),
        )
        .into());
    }

    let is_keyword_type = KEYWORD_TYPES.contains(&global.type_name.as_str());
    match &global.keywords {
        Some(_) if !is_keyword_type => Err(ValidationError::invalid(
            format!("global '{name}'"),
            format!("keywords are not allowed on type '{}'", global.type_name),
        )
        .into()),
        Some(keywords) if !global.value.is_empty() => {
            let tokens: Vec<&str> = if global.type_name == "set" {
                global.value.split('|').map(str::trim).collect()
            } else {
                vec![global.value.trim()]
            };
            match tokens.iter().find(|t| !keywords.contains_key(**t)) {
                Some(bad) => Err(ValidationError::invalid(
                    format!("global '{name}'"),
                    format!("'{bad}' is not a keyword of this {}", global.type_name),
                )
                .into()),
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::Keywords;
    use crate::schema::tests::catalog;
    use serde_json::json;

    fn solver_keywords() -> Keywords {
        [("FBS", json!("0")), ("NR", json!("2"))]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_add_global_validates_type() {
        let schema = catalog();
        let mut graph = ObjectGraph::default();
        graph
            .add_global(&schema, "title", GlobalDef::new(DEFAULT_GLOBAL_TYPE, "demo"))
            .unwrap();
        let err = graph
            .add_global(&schema, "bad", GlobalDef::new("quaternion", "1"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = graph
            .add_global(&schema, "title", GlobalDef::new(DEFAULT_GLOBAL_TYPE, "again"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityExists);
    }

    #[test]
    fn test_enumeration_value_must_be_keyword() {
        let schema = catalog();
        let mut graph = ObjectGraph::default();
        let solver = GlobalDef::new("enumeration", "NR").with_keywords(solver_keywords());
        graph.add_global(&schema, "solver", solver).unwrap();

        let err = graph.update_global(&schema, "solver", "GS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(graph.global("solver").unwrap().value, "NR");

        graph.update_global(&schema, "solver", "FBS").unwrap();
        assert_eq!(graph.global("solver").unwrap().value, "FBS");
    }

    #[test]
    fn test_set_tokens_checked() {
        let schema = catalog();
        let mut graph = ObjectGraph::default();
        let set = GlobalDef::new("set", "FBS|NR").with_keywords(solver_keywords());
        graph.add_global(&schema, "modes", set).unwrap();
        assert!(graph.update_global(&schema, "modes", "FBS|XX").is_err());
    }

    #[test]
    fn test_keywords_rejected_on_plain_type() {
        let schema = catalog();
        let mut graph = ObjectGraph::default();
        let bad = GlobalDef::new("double", "1").with_keywords(solver_keywords());
        assert!(graph.add_global(&schema, "x", bad).is_err());
    }

    #[test]
    fn test_delete_global() {
        let schema = catalog();
        let mut graph = ObjectGraph::default();
        graph.add_global(&schema, "a", GlobalDef::new("double", "1")).unwrap();
        graph.add_global(&schema, "b", GlobalDef::new("double", "2")).unwrap();
        graph.delete_global("a").unwrap();
        assert_eq!(graph.get_globals(None).unwrap().len(), 1);
        let err = graph.delete_global("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchEntity);
    }
}
