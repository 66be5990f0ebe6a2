//! # gldmodel - Schema-governed editing of GridLAB-D models
//!
//! gldmodel loads, validates, edits and saves the JSON model files written by
//! the GridLAB-D simulation engine. Every edit is checked against the schema
//! the model carries, and every edit either applies completely or leaves the
//! model unchanged.
//!
//! ## Core Concepts
//!
//! - **SchemaCatalog**: types, object header, modules and classes with single inheritance
//! - **ObjectGraph**: globals, objects, schedules and filters
//! - **ReferenceIndex**: who refers to an object, class, schedule or filter
//! - **Mutator**: add/update/delete operations with `fail|delete|ignore` cascades
//! - **Dispatcher**: table-driven `verb component args...` command routing
//! - **EngineGateway**: the external engine, used for module import and bootstrap
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gldmodel::{io, DeletePolicy};
//!
//! let mut model = io::load("feeder.json")?;
//! let node = model.add_object("node", None, [("phases".into(), "ABC".into())].into())?;
//! model.delete_object(&node.name, DeletePolicy::Fail)?;
//! io::save(&model, "feeder.json")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod model;
pub mod pattern;

// Schema, instances and references
pub mod graph;
pub mod reference;
pub mod schema;

// Mutation, commands and the engine boundary
pub mod command;
pub mod gateway;
pub mod io;
pub mod mutator;

pub use error::{
    CommandError, EngineError, EntityError, EntityKind, ErrorKind, ExitStatus, ModelError,
    ModelResult, ValidationError,
};
pub use model::{
    Access, ClassDef, FilterDef, GlobalDef, Model, ModuleDef, ObjectDef, ObjectId, PropertySpec,
};
pub use pattern::NamePattern;

pub use graph::{ObjectGraph, ObjectHandle};
pub use reference::{ReferenceIndex, Referrer};
pub use schema::SchemaCatalog;

pub use command::{Command, Component, Dispatcher, Outcome, Verb};
pub use gateway::{run_model, BootstrapCache, EngineGateway, GatewayConfig, ProcessGateway};
pub use mutator::{DeletePlan, DeletePolicy};
