//! Command dispatch.
//!
//! A command moves through Received, Shape-Checked and Routed before it is
//! either Applied or Rejected. The dispatcher only checks shape and input
//! presence; every domain rule is enforced by the model operation the
//! handler calls.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{route, Command, Component, Route, Verb};
use crate::error::{CommandError, ExitStatus, ModelError, ModelResult, ValidationError};
use crate::gateway::{BootstrapCache, EngineGateway};
use crate::graph::{ObjectHandle, DEFAULT_GLOBAL_TYPE};
use crate::model::{ClassDef, GlobalDef, Keywords, Model, PropertySpec, GLOBAL_KEYS};
use crate::mutator::{DeletePlan, DeletePolicy};

/// Result of an applied command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model was created or changed.
    Applied,
    /// An object was inserted.
    Inserted(ObjectHandle),
    /// Entities removed by a delete.
    Deleted(DeletePlan),
    /// Search result.
    Found(Value),
}

type Handler = fn(&mut Dispatcher<'_>, &Command, &mut Option<Model>) -> ModelResult<Outcome>;

/// (verb, component) to operation.
const HANDLERS: &[(Verb, Component, Handler)] = &[
    (Verb::Create, Component::Model, create_model),
    (Verb::Insert, Component::Module, insert_module),
    (Verb::Insert, Component::Class, insert_class),
    (Verb::Insert, Component::Object, insert_object),
    (Verb::Insert, Component::Global, insert_global),
    (Verb::Insert, Component::Schedule, insert_schedule),
    (Verb::Insert, Component::Filter, insert_filter),
    (Verb::Delete, Component::Module, delete_module),
    (Verb::Delete, Component::Class, delete_class),
    (Verb::Delete, Component::Object, delete_object),
    (Verb::Delete, Component::Global, delete_global),
    (Verb::Delete, Component::Schedule, delete_schedule),
    (Verb::Delete, Component::Filter, delete_filter),
    (Verb::Update, Component::Object, update_object),
    (Verb::Update, Component::Global, update_global),
    (Verb::Search, Component::Module, search_module),
    (Verb::Search, Component::Class, search_class),
    (Verb::Search, Component::Object, search_object),
    (Verb::Search, Component::Global, search_global),
    (Verb::Search, Component::Schedule, search_schedule),
    (Verb::Search, Component::Filter, search_filter),
    (Verb::Search, Component::Type, search_type),
    (Verb::Search, Component::Header, search_header),
    (Verb::Search, Component::Property, search_property),
];

/// Runs commands against a model held by the caller.
pub struct Dispatcher<'g> {
    gateway: &'g dyn EngineGateway,
    cache: BootstrapCache,
}

impl std::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<'g> Dispatcher<'g> {
    #[must_use]
    pub fn new(gateway: &'g dyn EngineGateway) -> Self {
        Self {
            gateway,
            cache: BootstrapCache::new(),
        }
    }

    /// Uses an existing bootstrap cache.
    #[must_use]
    pub fn with_cache(mut self, cache: BootstrapCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &BootstrapCache {
        &self.cache
    }

    /// Checks, routes and applies one command.
    ///
    /// `model` is the input model; `create` fills it and every other verb
    /// requires it. A rejected command leaves it unchanged.
    pub fn dispatch(&mut self, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
        debug!(
            verb = %command.verb,
            component = ?command.component,
            args = command.args.len(),
            kwargs = command.kwargs.len(),
            "command received"
        );
        let result = self.route_and_apply(command, model);
        match &result {
            Ok(_) => debug!(verb = %command.verb, "command applied"),
            Err(e) => debug!(verb = %command.verb, error = %e, "command rejected"),
        }
        result
    }

    /// Parses and dispatches a token list, mapping the result to an exit
    /// status. Search results are discarded; use [`Dispatcher::dispatch`]
    /// to read them.
    pub fn run<I, S>(&mut self, tokens: I, model: &mut Option<Model>) -> ExitStatus
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let result = Command::parse(tokens)
            .map_err(ModelError::from)
            .and_then(|command| self.dispatch(&command, model));
        match result {
            Ok(_) => ExitStatus::Ok,
            Err(e) => {
                let status = ExitStatus::from(&e);
                warn!(error = %e, kind = ?e.kind(), code = status.code(), "command failed");
                status
            }
        }
    }

    fn route_and_apply(&mut self, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
        let route = route(command.verb);
        check_shape(route, command)?;
        debug!(verb = %command.verb, "command shape-checked");
        check_input(route, model)?;
        let handler = resolve(command)?;
        debug!(verb = %command.verb, component = ?command.component, "command routed");
        handler(self, command, model)
    }
}

fn check_shape(route: &Route, command: &Command) -> Result<(), CommandError> {
    if command.args.len() < route.min_args {
        return Err(CommandError::TooFewArguments {
            verb: command.verb.to_string(),
            what: "positional",
            required: route.min_args,
            actual: command.args.len(),
        });
    }
    if command.kwargs.len() < route.min_kwargs {
        return Err(CommandError::TooFewArguments {
            verb: command.verb.to_string(),
            what: "keyword",
            required: route.min_kwargs,
            actual: command.kwargs.len(),
        });
    }
    Ok(())
}

fn check_input(route: &Route, model: &Option<Model>) -> Result<(), CommandError> {
    let verb = route.verb.to_string();
    match (route.input, model.is_some()) {
        (true, false) => Err(CommandError::MissingInput { verb }),
        (false, true) => Err(CommandError::UnexpectedInput { verb }),
        _ => Ok(()),
    }
}

fn resolve(command: &Command) -> Result<Handler, CommandError> {
    let component = match (command.verb, command.component) {
        (_, Some(component)) => component,
        (Verb::Create, None) => Component::Model,
        (verb, None) => {
            return Err(CommandError::NoHandler {
                verb: verb.to_string(),
                component: "(none)".to_string(),
            })
        }
    };
    HANDLERS
        .iter()
        .find(|(v, c, _)| *v == command.verb && *c == component)
        .map(|(_, _, handler)| *handler)
        .ok_or_else(|| CommandError::NoHandler {
            verb: command.verb.to_string(),
            component: component.to_string(),
        })
}

fn input(model: &mut Option<Model>) -> ModelResult<&mut Model> {
    model
        .as_mut()
        .ok_or_else(|| ModelError::internal("no input model after routing"))
}

fn view(model: &Option<Model>) -> ModelResult<&Model> {
    model
        .as_ref()
        .ok_or_else(|| ModelError::internal("no input model after routing"))
}

fn required_arg<'c>(command: &'c Command, index: usize, what: &str) -> ModelResult<&'c str> {
    command
        .arg(index)
        .ok_or_else(|| ValidationError::missing(what).into())
}

fn policy(command: &Command) -> ModelResult<DeletePolicy> {
    Ok(command
        .kwarg("found")
        .map(str::parse::<DeletePolicy>)
        .transpose()?
        .unwrap_or_default())
}

fn found(value: impl Serialize) -> ModelResult<Outcome> {
    serde_json::to_value(value)
        .map(Outcome::Found)
        .map_err(|e| ModelError::internal(format!("serialize search result: {e}")))
}

/// Parses `KEY:VALUE,KEY:VALUE`.
fn parse_keywords(text: &str) -> Result<Keywords, ValidationError> {
    let mut keywords = Keywords::new();
    for item in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = item.split_once(':') else {
            return Err(ValidationError::invalid(
                "keywords",
                format!("'{item}' is not of the form KEY:VALUE"),
            ));
        };
        keywords.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    if keywords.is_empty() {
        return Err(ValidationError::invalid("keywords", "keyword list is empty"));
    }
    Ok(keywords)
}

fn create_model(d: &mut Dispatcher<'_>, _: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let gateway = d.gateway;
    *model = Some(d.cache.fresh_model(gateway)?);
    Ok(Outcome::Applied)
}

fn insert_module(d: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "module name")?;
    input(model)?.add_module(d.gateway, name)?;
    Ok(Outcome::Applied)
}

fn insert_class(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "class name")?;
    let mut def = ClassDef::new();
    for (key, value) in &command.kwargs {
        match key.as_str() {
            "module" => def.module = Some(value.clone()),
            "parent" => def.parent = Some(value.clone()),
            property => {
                let spec = match value.split_once(':') {
                    Some((type_name, flags)) => PropertySpec::new(type_name).with_flags(flags),
                    None => PropertySpec::new(value.as_str()),
                };
                def.properties.insert(property.to_string(), spec);
            }
        }
    }
    input(model)?.add_class(name, def)?;
    Ok(Outcome::Applied)
}

fn insert_object(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let class = required_arg(command, 0, "object class")?;
    let handle = input(model)?.add_object(class, command.arg(1), command.kwargs.clone())?;
    Ok(Outcome::Inserted(handle))
}

fn insert_global(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "global name")?;
    let mut global = GlobalDef::new(
        command.kwarg("type").unwrap_or(DEFAULT_GLOBAL_TYPE),
        command.kwarg("value").unwrap_or_default(),
    );
    if let Some(access) = command.kwarg("access") {
        global.access = access.parse()?;
    }
    if let Some(keywords) = command.kwarg("keywords") {
        global.keywords = Some(parse_keywords(keywords)?);
    }
    for (key, value) in &command.kwargs {
        if !GLOBAL_KEYS.contains(&key.as_str()) {
            global.extra.insert(key.clone(), Value::String(value.clone()));
        }
    }
    input(model)?.add_global(name, global)?;
    Ok(Outcome::Applied)
}

fn insert_schedule(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "schedule name")?;
    let definition = command.args[1..].join(" ");
    input(model)?.add_schedule(name, definition)?;
    Ok(Outcome::Applied)
}

fn insert_filter(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "filter name")?;
    let fields: BTreeMap<String, Value> = command
        .kwargs
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    input(model)?.add_filter_fields(name, fields)?;
    Ok(Outcome::Applied)
}

fn delete_module(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "module name")?;
    let policy = policy(command)?;
    Ok(Outcome::Deleted(input(model)?.delete_module(name, policy)?))
}

fn delete_class(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "class name")?;
    let policy = policy(command)?;
    Ok(Outcome::Deleted(input(model)?.delete_class(name, policy)?))
}

fn delete_object(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "object name")?;
    let policy = policy(command)?;
    Ok(Outcome::Deleted(input(model)?.delete_object(name, policy)?))
}

fn delete_global(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "global name")?;
    input(model)?.delete_global(name)?;
    Ok(Outcome::Applied)
}

fn delete_schedule(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "schedule name")?;
    let policy = policy(command)?;
    Ok(Outcome::Deleted(input(model)?.delete_schedule(name, policy)?))
}

fn delete_filter(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "filter name")?;
    let policy = policy(command)?;
    Ok(Outcome::Deleted(input(model)?.delete_filter(name, policy)?))
}

fn update_object(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "object name")?;
    input(model)?.update_object(name, command.kwargs.clone())?;
    Ok(Outcome::Applied)
}

fn update_global(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let name = required_arg(command, 0, "global name")?;
    if let Some(key) = command.kwargs.keys().find(|k| k.as_str() != "value") {
        return Err(ValidationError::invalid(
            format!("global '{name}'"),
            format!("'{key}' cannot be updated; only 'value' can"),
        )
        .into());
    }
    let value = command
        .kwarg("value")
        .ok_or_else(|| ValidationError::missing(format!("global '{name}' value")))?;
    input(model)?.update_global(name, value)?;
    Ok(Outcome::Applied)
}

fn search_module(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.schema.get_modules(command.arg(0))?)
}

fn search_class(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.schema.get_classes(command.kwarg("module"), command.arg(0))?)
}

fn search_object(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let classes: Option<Vec<&str>> = command
        .kwarg("class")
        .map(|list| list.split(',').map(str::trim).collect());
    found(view(model)?.graph.get_objects(classes.as_deref(), command.arg(0))?)
}

fn search_global(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.graph.get_globals(command.arg(0))?)
}

fn search_schedule(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.graph.get_schedules(command.arg(0))?)
}

fn search_filter(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.graph.get_filters(command.arg(0))?)
}

fn search_type(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.schema.get_types(command.arg(0))?)
}

fn search_header(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    found(view(model)?.schema.get_headers(command.arg(0))?)
}

fn search_property(_: &mut Dispatcher<'_>, command: &Command, model: &mut Option<Model>) -> ModelResult<Outcome> {
    let class = required_arg(command, 0, "class name")?;
    found(view(model)?.schema.find_properties(class, command.arg(1))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::ModuleDef;
    use serde_json::json;

    fn engine_model() -> Model {
        let mut model = Model::new("gridlabd", "4.3.1");
        for t in ["double", "char1024", "object", "set", "enumeration"] {
            model.schema.types.insert(t.to_string(), json!({}));
        }
        model
    }

    fn engine(args: &[String]) -> ModelResult<Model> {
        let mut model = engine_model();
        if let [flag, module] = args {
            assert_eq!(flag, "--modhelp");
            model.schema.modules.insert(module.clone(), ModuleDef::new("4", "3"));
            model.schema.classes.insert(
                "node".to_string(),
                ClassDef::new()
                    .with_module(module.as_str())
                    .with_property("phases", PropertySpec::new("set").with_flags("REQUIRED")),
            );
        }
        Ok(model)
    }

    fn run(d: &mut Dispatcher<'_>, model: &mut Option<Model>, line: &str) -> ModelResult<Outcome> {
        let command = Command::parse(line.split_whitespace())?;
        d.dispatch(&command, model)
    }

    #[test]
    fn test_create_requires_no_input() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = None;
        assert_eq!(run(&mut d, &mut model, "create").unwrap(), Outcome::Applied);
        assert!(model.is_some());
        let err = run(&mut d, &mut model, "create model").unwrap_err();
        assert!(matches!(err, ModelError::Command(CommandError::UnexpectedInput { .. })));
    }

    #[test]
    fn test_input_required() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = None;
        let err = run(&mut d, &mut model, "search class").unwrap_err();
        assert!(matches!(err, ModelError::Command(CommandError::MissingInput { .. })));
    }

    #[test]
    fn test_arity_deficit_is_named() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = Some(engine_model());
        let err = run(&mut d, &mut model, "update object n1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command error: 'update' needs at least 1 keyword argument(s), got 0"
        );
        let err = run(&mut d, &mut model, "delete object").unwrap_err();
        assert!(matches!(
            err,
            ModelError::Command(CommandError::TooFewArguments { what: "positional", required: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn test_unrouted_pair() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = Some(engine_model());
        let err = run(&mut d, &mut model, "update class node x=1").unwrap_err();
        assert!(matches!(err, ModelError::Command(CommandError::NoHandler { .. })));
        let err = run(&mut d, &mut model, "delete x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);
    }

    #[test]
    fn test_module_class_object_flow() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = None;
        run(&mut d, &mut model, "create").unwrap();
        run(&mut d, &mut model, "insert module powerflow").unwrap();
        run(&mut d, &mut model, "add class meter parent=node module=powerflow measured=double:REQUIRED").unwrap();

        let err = run(&mut d, &mut model, "insert object meter m1 measured=1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingValue);
        let inserted = run(&mut d, &mut model, "insert object meter m1 measured=1 phases=ABC").unwrap();
        assert!(matches!(inserted, Outcome::Inserted(ObjectHandle { ref name, .. }) if name == "m1"));

        let Outcome::Found(found) = run(&mut d, &mut model, "search object m class=meter").unwrap() else {
            panic!("search returns a value");
        };
        assert_eq!(found["m1"]["phases"], json!("ABC"));

        let Outcome::Found(props) = run(&mut d, &mut model, "search property meter").unwrap() else {
            panic!("search returns a value");
        };
        assert_eq!(props, json!(["measured"]));
    }

    #[test]
    fn test_global_commands() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = Some(engine_model());
        run(&mut d, &mut model, "insert global solver type=enumeration keywords=FBS:0,NR:2 value=NR").unwrap();
        run(&mut d, &mut model, "update global solver value=FBS").unwrap();
        let err = run(&mut d, &mut model, "update global solver value=GS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let err = run(&mut d, &mut model, "insert global bad keywords=FBS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = run(&mut d, &mut model, "insert global bad access=SECRET").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = run(&mut d, &mut model, "insert global bad unit=V").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        run(&mut d, &mut model, "insert global title value=demo").unwrap();
        let g = &model.as_ref().unwrap().graph.globals["title"];
        assert_eq!(g.type_name, DEFAULT_GLOBAL_TYPE);

        run(&mut d, &mut model, "delete global title").unwrap();
        let err = run(&mut d, &mut model, "delete global title").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchEntity);
    }

    #[test]
    fn test_schedule_and_filter_commands() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = Some(engine_model());
        run(&mut d, &mut model, "insert schedule weekday * 8-17 * * 1-5 1.0").unwrap();
        assert_eq!(model.as_ref().unwrap().graph.schedules["weekday"], "* 8-17 * * 1-5 1.0");
        let err = run(&mut d, &mut model, "insert schedule empty").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingValue);

        let err = run(&mut d, &mut model, "insert filter f domain=z timestep=60").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingValue);
        run(&mut d, &mut model, "insert filter f domain=z timestep=60 numerator=1 denominator=1,-0.5").unwrap();

        let err = run(&mut d, &mut model, "delete filter f found=sometimes").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let outcome = run(&mut d, &mut model, "delete filter f found=delete").unwrap();
        assert_eq!(outcome, Outcome::Deleted(DeletePlan::default()));
        run(&mut d, &mut model, "delete schedule weekday").unwrap();
    }

    #[test]
    fn test_search_never_mutates() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = None;
        run(&mut d, &mut model, "create").unwrap();
        run(&mut d, &mut model, "insert module powerflow").unwrap();
        let before = model.clone();
        for line in ["search module", "search class n module=powerflow", "search type d", "search header", "search global"] {
            run(&mut d, &mut model, line).unwrap();
        }
        assert_eq!(before, model);
    }

    #[test]
    fn test_run_maps_exit_status() {
        let gateway = engine;
        let mut d = Dispatcher::new(&gateway);
        let mut model = None;
        assert_eq!(d.run(["create"], &mut model), ExitStatus::Ok);
        assert_eq!(d.run(["frobnicate"], &mut model), ExitStatus::InvalidArguments);
        assert_eq!(d.run(["delete", "object", "ghost"], &mut model), ExitStatus::InvalidArguments);

        let failing = |_: &[String]| -> ModelResult<Model> {
            Err(crate::error::EngineError::Failed {
                code: Some(2),
                stderr: "crash".to_string(),
            }
            .into())
        };
        let mut d = Dispatcher::new(&failing);
        let mut model = None;
        assert_eq!(d.run(["create"], &mut model), ExitStatus::EngineFailed);
        assert!(model.is_none());
    }
}
