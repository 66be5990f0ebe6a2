//! Deletion planning.
//!
//! A delete is resolved in two phases. The planner walks the dependents of
//! the target under the requested [`DeletePolicy`] and collects every entity
//! that would be removed; the plan is then checked for inbound references
//! from objects outside of it. Only a plan that passes is applied, so a
//! rejected delete leaves the model unchanged.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::DeletePolicy;
use crate::error::{EntityError, EntityKind, ModelResult};
use crate::graph::ObjectGraph;
use crate::model::Model;
use crate::reference::ReferenceIndex;
use crate::schema::SchemaCatalog;

/// Entities removed by one delete.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePlan {
    pub modules: BTreeSet<String>,
    pub classes: BTreeSet<String>,
    pub objects: BTreeSet<String>,
}

impl DeletePlan {
    /// Total number of entities in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len() + self.classes.len() + self.objects.len()
    }

    /// Returns true if the plan removes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every planned entity from the model.
    pub(crate) fn apply(&self, model: &mut Model) {
        for name in &self.objects {
            model.graph.objects.remove(name);
        }
        for name in &self.classes {
            model.schema.classes.remove(name);
        }
        for name in &self.modules {
            model.schema.modules.remove(name);
        }
        debug!(
            modules = self.modules.len(),
            classes = self.classes.len(),
            objects = self.objects.len(),
            "delete plan applied"
        );
    }
}

pub(crate) struct Planner<'a> {
    schema: &'a SchemaCatalog,
    graph: &'a ObjectGraph,
    index: ReferenceIndex<'a>,
    policy: DeletePolicy,
    plan: DeletePlan,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(model: &'a Model, policy: DeletePolicy) -> Self {
        Self {
            schema: &model.schema,
            graph: &model.graph,
            index: ReferenceIndex::new(&model.schema, &model.graph),
            policy,
            plan: DeletePlan::default(),
        }
    }

    pub(crate) const fn index(&self) -> &ReferenceIndex<'a> {
        &self.index
    }

    /// Plans removal of a module and, under `delete`, the classes that
    /// declare it.
    pub(crate) fn module(&mut self, name: &str) -> ModelResult<()> {
        let schema = self.schema;
        schema.module(name)?;
        if !self.plan.modules.insert(name.to_string()) {
            return Ok(());
        }
        let classes: Vec<&str> = schema
            .classes
            .iter()
            .filter(|(_, c)| c.module.as_deref() == Some(name))
            .map(|(n, _)| n.as_str())
            .collect();
        let Some(first) = classes.first() else {
            return Ok(());
        };
        match self.policy {
            DeletePolicy::Fail => Err(in_use(EntityKind::Module, name, EntityKind::Class, first)),
            DeletePolicy::Delete => {
                for class in classes {
                    self.class(class)?;
                }
                Ok(())
            }
            DeletePolicy::Ignore => {
                warn!(module = %name, classes = classes.len(), "classes keep a reference to a deleted module");
                Ok(())
            }
        }
    }

    /// Plans removal of a class and, under `delete`, its subclasses and
    /// instances.
    pub(crate) fn class(&mut self, name: &str) -> ModelResult<()> {
        self.schema.class(name)?;
        if !self.plan.classes.insert(name.to_string()) {
            return Ok(());
        }
        let (subclasses, instances) = self.index.class_dependents(name);
        if subclasses.is_empty() && instances.is_empty() {
            return Ok(());
        }
        match self.policy {
            DeletePolicy::Fail => Err(match subclasses.first() {
                Some(sub) => in_use(EntityKind::Class, name, EntityKind::Class, sub),
                None => in_use(EntityKind::Class, name, EntityKind::Object, instances[0]),
            }),
            DeletePolicy::Delete => {
                for sub in subclasses {
                    self.class(sub)?;
                }
                for object in instances {
                    self.dependent(object)?;
                }
                Ok(())
            }
            DeletePolicy::Ignore => {
                warn!(
                    class = %name,
                    subclasses = subclasses.len(),
                    objects = instances.len(),
                    "dependents keep a reference to a deleted class"
                );
                Ok(())
            }
        }
    }

    /// Plans removal of an object. The policy governs the object's own
    /// outbound references.
    pub(crate) fn object(&mut self, name: &str) -> ModelResult<()> {
        self.plan_object(name, self.policy)
    }

    /// Plans removal of an object swept up by the delete of something else
    /// (its class, module, schedule or filter). Its outbound targets are left
    /// in place; only a direct object delete cascades into them.
    pub(crate) fn dependent(&mut self, name: &str) -> ModelResult<()> {
        self.plan_object(name, DeletePolicy::Ignore)
    }

    fn plan_object(&mut self, name: &str, outbound: DeletePolicy) -> ModelResult<()> {
        self.graph.object(name)?;
        if !self.plan.objects.insert(name.to_string()) {
            return Ok(());
        }
        let references = self.index.outbound_references(name)?;
        for (property, target) in references {
            if target == name {
                continue;
            }
            match outbound {
                DeletePolicy::Fail => {
                    return Err(EntityError::HasReference {
                        name: name.to_string(),
                        property: property.to_string(),
                        target: target.to_string(),
                    }
                    .into());
                }
                DeletePolicy::Delete => self.plan_object(target, outbound)?,
                DeletePolicy::Ignore if self.plan.objects.contains(target) => {}
                DeletePolicy::Ignore => {
                    debug!(object = %name, property = %property, target = %target, "outbound reference left in place");
                }
            }
        }
        Ok(())
    }

    /// Checks that no object outside the plan refers to an object in it,
    /// then hands the plan out.
    pub(crate) fn finish(self) -> ModelResult<DeletePlan> {
        for name in &self.plan.objects {
            if let Some(referrer) = self.index.first_referrer_outside(name, &self.plan.objects)? {
                return Err(in_use(EntityKind::Object, name, EntityKind::Object, referrer.object));
            }
        }
        Ok(self.plan)
    }
}

pub(crate) fn in_use(kind: EntityKind, name: &str, user_kind: EntityKind, user: &str) -> crate::error::ModelError {
    EntityError::InUse {
        kind,
        name: name.to_string(),
        user_kind,
        user: user.to_string(),
    }
    .into()
}
