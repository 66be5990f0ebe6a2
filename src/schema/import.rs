//! Module import.
//!
//! Module schemas come from the engine (`--modhelp <module>`). Imports follow
//! define-once semantics: a type, module or class already in the catalog may
//! only be imported again with identical content.

use tracing::{debug, info};

use super::SchemaCatalog;
use crate::error::{EntityError, EntityKind, ModelResult, ValidationError};
use crate::gateway::EngineGateway;
use crate::model::ModuleDef;

impl SchemaCatalog {
    /// Imports a module's schema through the engine and merges it.
    ///
    /// A module that is already loaded is returned without running the engine.
    pub fn import_module(
        &mut self,
        gateway: &dyn EngineGateway,
        name: &str,
    ) -> ModelResult<&ModuleDef> {
        if self.modules.contains_key(name) {
            debug!(module = %name, "module already loaded");
            return Ok(self.module(name)?);
        }
        let args = vec!["--modhelp".to_string(), name.to_string()];
        let imported = gateway.run(&args)?;
        self.merge_module(name, &imported.schema)?;
        Ok(self.module(name)?)
    }

    /// Merges the definitions of `source` into this catalog, requiring that
    /// `source` declares module `name`.
    ///
    /// Conflicts are detected before anything is inserted, so a failed merge
    /// leaves the catalog unchanged.
    pub fn merge_module(&mut self, name: &str, source: &Self) -> ModelResult<()> {
        if !source.modules.contains_key(name) {
            return Err(EntityError::not_found(EntityKind::Module, name).into());
        }

        for (type_name, def) in &source.types {
            if self.types.get(type_name).is_some_and(|existing| existing != def) {
                return Err(conflict(EntityKind::Type, type_name));
            }
        }
        for (module, def) in &source.modules {
            if self.modules.get(module).is_some_and(|existing| existing != def) {
                return Err(conflict(EntityKind::Module, module));
            }
        }
        for (class, def) in &source.classes {
            if self.classes.get(class).is_some_and(|existing| existing != def) {
                return Err(conflict(EntityKind::Class, class));
            }
        }

        let mut added = 0usize;
        for (type_name, def) in &source.types {
            self.types
                .entry(type_name.clone())
                .or_insert_with(|| def.clone());
        }
        for (module, def) in &source.modules {
            self.modules
                .entry(module.clone())
                .or_insert_with(|| def.clone());
        }
        for (class, def) in &source.classes {
            if !self.classes.contains_key(class) {
                self.classes.insert(class.clone(), def.clone());
                added += 1;
            }
        }
        info!(module = %name, classes = added, "module imported");
        Ok(())
    }
}

fn conflict(kind: EntityKind, name: &str) -> crate::error::ModelError {
    ValidationError::SchemaConflict {
        kind,
        name: name.to_string(),
    }
    .into()
}
