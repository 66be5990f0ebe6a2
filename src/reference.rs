//! Reference counting over the object graph.
//!
//! Counts are computed by rescanning the graph on every call; nothing is
//! cached between calls, so results always reflect the current state. A
//! `limit` stops the scan once that many references have been seen.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{ErrorKind, ModelResult};
use crate::graph::ObjectGraph;
use crate::schema::{SchemaCatalog, OBJECT_TYPE};

/// One property of one object that refers to something.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referrer<'a> {
    pub object: &'a str,
    pub property: &'a str,
}

/// Read-only view answering "who refers to this?" questions.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceIndex<'a> {
    schema: &'a SchemaCatalog,
    graph: &'a ObjectGraph,
}

impl<'a> ReferenceIndex<'a> {
    /// Creates an index over the given schema and graph.
    #[must_use]
    pub const fn new(schema: &'a SchemaCatalog, graph: &'a ObjectGraph) -> Self {
        Self { schema, graph }
    }

    /// Counts object properties of type `object` whose value is `target`.
    pub fn count_object_references(&self, target: &str, limit: Option<usize>) -> ModelResult<usize> {
        Ok(self.scan_objects(target, limit, |_| false)?.len())
    }

    /// Every (object, property) pair referring to object `target`.
    pub fn object_referrers(&self, target: &str) -> ModelResult<Vec<Referrer<'a>>> {
        self.scan_objects(target, None, |_| false)
    }

    /// The first referrer of `target` that is not in `excluded`.
    pub fn first_referrer_outside(
        &self,
        target: &str,
        excluded: &BTreeSet<String>,
    ) -> ModelResult<Option<Referrer<'a>>> {
        Ok(self
            .scan_objects(target, Some(1), |object| excluded.contains(object))?
            .into_iter()
            .next())
    }

    /// Live objects that `name` refers to through properties declared by its
    /// class chain, as (property, target) pairs. Header attributes such as
    /// `parent` are not included.
    pub fn outbound_references(&self, name: &str) -> ModelResult<Vec<(&'a str, &'a str)>> {
        let graph = self.graph;
        let Some(object) = graph.objects.get(name) else {
            return Ok(Vec::new());
        };
        let reference_properties = self.reference_properties(&object.class, false)?;
        Ok(object
            .properties
            .iter()
            .filter(|(property, value)| {
                reference_properties.contains(property.as_str())
                    && graph.objects.contains_key(value.as_str())
            })
            .map(|(property, value)| (property.as_str(), value.as_str()))
            .collect())
    }

    /// Counts classes whose parent is `target` plus objects whose class is `target`.
    #[must_use]
    pub fn count_class_references(&self, target: &str, limit: Option<usize>) -> usize {
        let subclasses = self
            .schema
            .classes
            .values()
            .filter(|c| c.parent.as_deref() == Some(target));
        let instances = self.graph.objects.values().filter(|o| o.class == target);
        let total = subclasses.map(|_| ()).chain(instances.map(|_| ()));
        match limit {
            Some(n) => total.take(n).count(),
            None => total.count(),
        }
    }

    /// Subclasses and instances of `target`.
    #[must_use]
    pub fn class_dependents(&self, target: &str) -> (Vec<&'a str>, Vec<&'a str>) {
        let (schema, graph) = (self.schema, self.graph);
        let subclasses = schema
            .classes
            .iter()
            .filter(|(_, c)| c.parent.as_deref() == Some(target))
            .map(|(name, _)| name.as_str())
            .collect();
        let instances = graph
            .objects
            .iter()
            .filter(|(_, o)| o.class == target)
            .map(|(name, _)| name.as_str())
            .collect();
        (subclasses, instances)
    }

    /// Counts property values that invoke schedule or filter `name` as `name(...)`.
    #[must_use]
    pub fn count_call_references(&self, name: &str, limit: Option<usize>) -> usize {
        let found = self.call_referrers_iter(name);
        match limit {
            Some(n) => found.take(n).count(),
            None => found.count(),
        }
    }

    /// Every (object, property) pair invoking schedule or filter `name`.
    #[must_use]
    pub fn call_referrers(&self, name: &str) -> Vec<Referrer<'a>> {
        self.call_referrers_iter(name).collect()
    }

    fn call_referrers_iter(&self, name: &str) -> impl Iterator<Item = Referrer<'a>> {
        let prefix = format!("{name}(");
        let graph = self.graph;
        graph.objects.iter().flat_map(move |(object, def)| {
            let prefix = prefix.clone();
            def.properties
                .iter()
                .filter(move |(_, value)| value.trim_start().starts_with(&prefix))
                .map(move |(property, _)| Referrer {
                    object: object.as_str(),
                    property: property.as_str(),
                })
        })
    }

    fn scan_objects(
        &self,
        target: &str,
        limit: Option<usize>,
        skip: impl Fn(&str) -> bool,
    ) -> ModelResult<Vec<Referrer<'a>>> {
        let mut found = Vec::new();
        if limit == Some(0) {
            return Ok(found);
        }
        let graph = self.graph;
        let mut by_class: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for (name, object) in &graph.objects {
            if skip(name) {
                continue;
            }
            if !by_class.contains_key(object.class.as_str()) {
                let props = self.reference_properties(&object.class, true)?;
                by_class.insert(object.class.as_str(), props);
            }
            let reference_properties = &by_class[object.class.as_str()];
            for (property, value) in &object.properties {
                if value == target && reference_properties.contains(property.as_str()) {
                    found.push(Referrer {
                        object: name.as_str(),
                        property: property.as_str(),
                    });
                    if limit.is_some_and(|n| found.len() >= n) {
                        return Ok(found);
                    }
                }
            }
        }
        Ok(found)
    }

    /// Names of properties typed `object` for instances of `class`, resolved
    /// with the same precedence as [`SchemaCatalog::get_property_type`].
    /// An undefined class has no known reference properties.
    fn reference_properties(
        &self,
        class: &str,
        with_header: bool,
    ) -> ModelResult<BTreeSet<&'a str>> {
        let schema = self.schema;
        let chain = match schema.ancestors(class) {
            Ok(chain) => chain,
            Err(e) if e.kind() == ErrorKind::NoSuchEntity => return Ok(BTreeSet::new()),
            Err(e) => return Err(e),
        };
        let mut types: BTreeMap<&'a str, &'a str> = BTreeMap::new();
        for (_, def) in chain.into_iter().rev() {
            for (property, spec) in &def.properties {
                types.insert(property.as_str(), spec.type_name.as_str());
            }
        }
        for (property, spec) in schema.header.iter().filter(|_| with_header) {
            types.insert(property.as_str(), spec.type_name.as_str());
        }
        Ok(types
            .into_iter()
            .filter(|(_, t)| *t == OBJECT_TYPE)
            .map(|(p, _)| p)
            .collect())
    }
}
