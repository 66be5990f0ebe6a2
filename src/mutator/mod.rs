//! Mutation surface of [`Model`].
//!
//! Every operation validates before it writes. Deletes go through a
//! [`DeletePlan`] so that cascades either apply completely or not at all.

mod plan;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::{info, warn};

pub use plan::DeletePlan;
use plan::{in_use, Planner};

use crate::error::{EntityKind, ModelResult, ValidationError};
use crate::gateway::EngineGateway;
use crate::graph::ObjectHandle;
use crate::model::{ClassDef, FilterDef, GlobalDef, Model, ModuleDef};

/// Disposition of dependents found while deleting (`found=` on the command
/// line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeletePolicy {
    /// Abort the delete.
    #[default]
    Fail,
    /// Delete the dependents too.
    Delete,
    /// Leave the dependents in place.
    Ignore,
}

impl DeletePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Delete => "delete",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "delete" => Ok(Self::Delete),
            "ignore" => Ok(Self::Ignore),
            other => Err(ValidationError::invalid(
                "found",
                format!("'{other}' is not one of fail|delete|ignore"),
            )),
        }
    }
}

impl Model {
    /// Loads a module through the engine.
    pub fn add_module(&mut self, gateway: &dyn EngineGateway, name: &str) -> ModelResult<&ModuleDef> {
        self.schema.import_module(gateway, name)
    }

    /// Deletes a module. Classes declaring it are its dependents.
    pub fn delete_module(&mut self, name: &str, policy: DeletePolicy) -> ModelResult<DeletePlan> {
        let plan = {
            let mut planner = Planner::new(self, policy);
            planner.module(name)?;
            planner.finish()?
        };
        plan.apply(self);
        info!(module = %name, policy = %policy, removed = plan.len(), "module deleted");
        Ok(plan)
    }

    /// Adds a class.
    pub fn add_class(&mut self, name: &str, def: ClassDef) -> ModelResult<()> {
        self.schema.add_class(name, def)?;
        info!(class = %name, "class added");
        Ok(())
    }

    /// Deletes a class. Subclasses and instances are its dependents.
    pub fn delete_class(&mut self, name: &str, policy: DeletePolicy) -> ModelResult<DeletePlan> {
        let plan = {
            let mut planner = Planner::new(self, policy);
            planner.class(name)?;
            planner.finish()?
        };
        plan.apply(self);
        info!(class = %name, policy = %policy, removed = plan.len(), "class deleted");
        Ok(plan)
    }

    /// Adds an object. See [`crate::graph::ObjectGraph::add_object`].
    pub fn add_object(
        &mut self,
        class: &str,
        name: Option<&str>,
        properties: BTreeMap<String, String>,
    ) -> ModelResult<ObjectHandle> {
        self.graph.add_object(&self.schema, class, name, properties)
    }

    /// Sets properties of an existing object.
    pub fn update_object(&mut self, name: &str, properties: BTreeMap<String, String>) -> ModelResult<()> {
        self.graph.update_object(&self.schema, name, properties)
    }

    /// Deletes an object.
    ///
    /// Any inbound reference to `name` blocks the delete whatever the policy.
    /// The policy governs the object's outbound references.
    pub fn delete_object(&mut self, name: &str, policy: DeletePolicy) -> ModelResult<DeletePlan> {
        let plan = {
            let mut planner = Planner::new(self, policy);
            self.graph.object(name)?;
            if let Some(referrer) = planner.index().object_referrers(name)?.first() {
                return Err(in_use(EntityKind::Object, name, EntityKind::Object, referrer.object));
            }
            planner.object(name)?;
            planner.finish()?
        };
        plan.apply(self);
        info!(object = %name, policy = %policy, removed = plan.len(), "object deleted");
        Ok(plan)
    }

    /// Adds a global.
    pub fn add_global(&mut self, name: &str, global: GlobalDef) -> ModelResult<()> {
        self.graph.add_global(&self.schema, name, global)
    }

    /// Changes the value of a global.
    pub fn update_global(&mut self, name: &str, value: impl Into<String>) -> ModelResult<()> {
        self.graph.update_global(&self.schema, name, value)
    }

    /// Deletes a global.
    pub fn delete_global(&mut self, name: &str) -> ModelResult<GlobalDef> {
        self.graph.delete_global(name)
    }

    /// Adds a schedule.
    pub fn add_schedule(&mut self, name: &str, definition: impl Into<String>) -> ModelResult<()> {
        self.graph.add_schedule(name, definition)
    }

    /// Deletes a schedule. Objects with a property value of the form
    /// `name(...)` are its dependents.
    pub fn delete_schedule(&mut self, name: &str, policy: DeletePolicy) -> ModelResult<DeletePlan> {
        self.graph.schedule(name)?;
        let plan = self.plan_call_delete(EntityKind::Schedule, name, policy)?;
        plan.apply(self);
        self.graph.schedules.remove(name);
        info!(schedule = %name, policy = %policy, removed = plan.len(), "schedule deleted");
        Ok(plan)
    }

    /// Adds a filter.
    pub fn add_filter(&mut self, name: &str, filter: FilterDef) -> ModelResult<()> {
        self.graph.add_filter(name, filter)
    }

    /// Adds a filter from its keyed fields.
    pub fn add_filter_fields(&mut self, name: &str, fields: BTreeMap<String, Value>) -> ModelResult<()> {
        let filter = FilterDef::from_fields(name, fields)?;
        self.add_filter(name, filter)
    }

    /// Deletes a filter. Dependents are found as for schedules.
    pub fn delete_filter(&mut self, name: &str, policy: DeletePolicy) -> ModelResult<DeletePlan> {
        self.graph.filter(name)?;
        let plan = self.plan_call_delete(EntityKind::Filter, name, policy)?;
        plan.apply(self);
        self.graph.filters.remove(name);
        info!(filter = %name, policy = %policy, removed = plan.len(), "filter deleted");
        Ok(plan)
    }

    fn plan_call_delete(
        &self,
        kind: EntityKind,
        name: &str,
        policy: DeletePolicy,
    ) -> ModelResult<DeletePlan> {
        let mut planner = Planner::new(self, policy);
        let users = planner.index().call_referrers(name);
        match policy {
            DeletePolicy::Fail => {
                if let Some(user) = users.first() {
                    return Err(in_use(kind, name, EntityKind::Object, user.object));
                }
            }
            DeletePolicy::Delete => {
                for user in &users {
                    planner.dependent(user.object)?;
                }
            }
            DeletePolicy::Ignore => {
                if !users.is_empty() {
                    warn!(%kind, name = %name, users = users.len(), "objects keep calling a deleted {kind}");
                }
            }
        }
        planner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EntityError, ErrorKind, ModelError};
    use crate::model::PropertySpec;
    use crate::schema::tests::catalog;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn model() -> Model {
        let mut model = Model::new("gridlabd", "4.3.1");
        model.schema = catalog();
        model
            .add_class(
                "link",
                ClassDef::new()
                    .with_module("powerflow")
                    .with_property("from", PropertySpec::new("object"))
                    .with_property("to", PropertySpec::new("object")),
            )
            .unwrap();
        let node = [("phases", "ABC"), ("nominal_voltage", "120")];
        model.add_object("node", Some("n1"), props(&node)).unwrap();
        model.add_object("node", Some("n2"), props(&node)).unwrap();
        model
            .add_object("link", Some("l1"), props(&[("from", "n1"), ("to", "n2")]))
            .unwrap();
        model
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("delete".parse::<DeletePolicy>().unwrap(), DeletePolicy::Delete);
        assert_eq!(DeletePolicy::default(), DeletePolicy::Fail);
        assert!("cascade".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn test_inbound_reference_blocks_every_policy() {
        let mut m = model();
        for policy in [DeletePolicy::Fail, DeletePolicy::Delete, DeletePolicy::Ignore] {
            let err = m.delete_object("n1", policy).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::EntityInUse);
        }
        assert_eq!(m.graph.objects.len(), 3);
    }

    #[test]
    fn test_outbound_fail_aborts() {
        let mut m = model();
        let before = m.clone();
        let err = m.delete_object("l1", DeletePolicy::Fail).unwrap_err();
        assert!(matches!(err, ModelError::Entity(EntityError::HasReference { .. })));
        assert_eq!(before, m);
    }

    #[test]
    fn test_outbound_delete_cascades() {
        let mut m = model();
        let plan = m.delete_object("l1", DeletePolicy::Delete).unwrap();
        assert_eq!(plan.objects.len(), 3);
        assert!(m.graph.objects.is_empty());
    }

    #[test]
    fn test_outbound_delete_stops_at_outside_referrer() {
        let mut m = model();
        m.add_object("link", Some("l2"), props(&[("from", "n2")])).unwrap();
        let before = m.clone();
        let err = m.delete_object("l1", DeletePolicy::Delete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityInUse);
        assert_eq!(before, m);
    }

    #[test]
    fn test_outbound_ignore_leaves_targets() {
        let mut m = model();
        m.delete_object("l1", DeletePolicy::Ignore).unwrap();
        assert_eq!(m.graph.objects.len(), 2);
    }

    #[test]
    fn test_delete_class_policies() {
        let mut m = model();
        let err = m.delete_class("link", DeletePolicy::Fail).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityInUse);

        let err = m.delete_class("node", DeletePolicy::Delete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityInUse, "l1 still refers to the nodes");

        let plan = m.delete_class("link", DeletePolicy::Ignore).unwrap();
        assert_eq!(plan.classes.len(), 1);
        assert!(plan.objects.is_empty());
        assert!(m.graph.objects.contains_key("l1"));
    }

    #[test]
    fn test_class_cascade_keeps_outbound_targets() {
        let mut m = model();
        let plan = m.delete_class("link", DeletePolicy::Delete).unwrap();
        assert_eq!(plan.objects.into_iter().collect::<Vec<_>>(), vec!["l1"]);
        assert!(m.graph.objects.contains_key("n1"));
        assert!(m.graph.objects.contains_key("n2"));
    }

    #[test]
    fn test_delete_module_cascades_through_classes() {
        let mut m = model();
        let err = m.delete_module("powerflow", DeletePolicy::Fail).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityInUse);
        let plan = m.delete_module("powerflow", DeletePolicy::Delete).unwrap();
        assert!(m.schema.modules.is_empty());
        assert!(m.schema.classes.is_empty());
        assert!(m.graph.objects.is_empty());
        assert_eq!(plan.classes.len(), 4);
    }

    #[test]
    fn test_delete_module_ignore_detaches() {
        let mut m = model();
        m.delete_module("powerflow", DeletePolicy::Ignore).unwrap();
        assert!(m.schema.modules.is_empty());
        assert_eq!(m.schema.classes["node"].module.as_deref(), Some("powerflow"));
    }

    #[test]
    fn test_delete_schedule_policies() {
        let mut m = model();
        m.add_schedule("weekday", "* * * * 1-5 1.0").unwrap();
        m.update_object("n2", props(&[("voltage_A", "weekday(120)")])).unwrap();

        let err = m.delete_schedule("weekday", DeletePolicy::Fail).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityInUse);
        let err = m.delete_schedule("weekday", DeletePolicy::Delete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityInUse, "n2 is referenced by l1");

        m.delete_schedule("weekday", DeletePolicy::Ignore).unwrap();
        assert!(m.graph.schedules.is_empty());
        let err = m.delete_schedule("weekday", DeletePolicy::Ignore).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchEntity);
    }

    #[test]
    fn test_delete_filter_removes_users() {
        let mut m = model();
        let fields = [("domain", "z"), ("timestep", "60"), ("numerator", "1"), ("denominator", "1,-0.5")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        m.add_filter_fields("lowpass", fields).unwrap();
        m.delete_object("l1", DeletePolicy::Ignore).unwrap();
        m.update_object("n1", props(&[("voltage_A", "lowpass(n1)")])).unwrap();
        let plan = m.delete_filter("lowpass", DeletePolicy::Delete).unwrap();
        assert_eq!(plan.objects.into_iter().collect::<Vec<_>>(), vec!["n1"]);
        assert!(m.graph.filters.is_empty());
    }
}
