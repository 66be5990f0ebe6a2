//! Error types for gldmodel.
//!
//! All errors are strongly typed using thiserror. Each domain gets its own
//! enum and [`ModelError`] wraps them, so callers can match on the specific
//! condition or just on its [`ErrorKind`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The kinds of named entities held by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A data type in the type catalog.
    Type,
    /// A module loaded from the engine.
    Module,
    /// An object class.
    Class,
    /// An object instance.
    Object,
    /// A global variable.
    Global,
    /// A schedule definition.
    Schedule,
    /// A filter definition.
    Filter,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Type => "type",
            Self::Module => "module",
            Self::Class => "class",
            Self::Object => "object",
            Self::Global => "global",
            Self::Schedule => "schedule",
            Self::Filter => "filter",
        };
        f.write_str(s)
    }
}

/// Validation errors raised when a value or definition fails a domain check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid model: {reason}")]
    InvalidModel {
        reason: String,
    },

    #[error("Class '{class}' has a cyclic parent chain")]
    CyclicParent {
        class: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingValue {
        field: String,
    },

    #[error("Class '{class}' is missing required properties: {}", missing.join(", "))]
    MissingRequiredProperty {
        class: String,
        missing: Vec<String>,
    },

    #[error("Class '{class}' has no property '{property}'")]
    MissingProperty {
        class: String,
        property: String,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("{kind} '{name}' conflicts with an existing definition")]
    SchemaConflict {
        kind: EntityKind,
        name: String,
    },
}

impl ValidationError {
    /// Creates an invalid value error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing value error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingValue {
            field: field.into(),
        }
    }
}

/// Errors raised by lookups and by insertions or deletions that collide with
/// existing state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
    #[error("{kind} '{name}' not found")]
    NotFound {
        kind: EntityKind,
        name: String,
    },

    #[error("{kind} '{name}' already exists")]
    Exists {
        kind: EntityKind,
        name: String,
    },

    #[error("{kind} '{name}' is in use by {user_kind} '{user}'")]
    InUse {
        kind: EntityKind,
        name: String,
        user_kind: EntityKind,
        user: String,
    },

    #[error("object '{name}' refers to object '{target}' through '{property}'")]
    HasReference {
        name: String,
        property: String,
        target: String,
    },
}

impl EntityError {
    /// Creates a not-found error.
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an already-exists error.
    pub fn exists(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::Exists {
            kind,
            name: name.into(),
        }
    }
}

/// Dispatcher-level shape errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown verb '{verb}'")]
    UnknownVerb {
        verb: String,
    },

    #[error("Unknown component '{component}'")]
    UnknownComponent {
        component: String,
    },

    #[error("'{verb}' needs at least {required} {what} argument(s), got {actual}")]
    TooFewArguments {
        verb: String,
        what: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("'{verb}' requires an input model")]
    MissingInput {
        verb: String,
    },

    #[error("'{verb}' does not accept an input model")]
    UnexpectedInput {
        verb: String,
    },

    #[error("No handler for '{verb} {component}'")]
    NoHandler {
        verb: String,
        component: String,
    },

    #[error("Empty command")]
    Empty,
}

/// External engine failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine exited with code {code:?}: {stderr}")]
    Failed {
        code: Option<i32>,
        stderr: String,
    },

    #[error("Engine could not be started: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    #[error("Engine produced an unusable payload: {reason}")]
    Payload {
        reason: String,
    },
}

/// Top-level error type for gldmodel.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Entity error: {0}")]
    Entity(#[from] EntityError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

/// The closed set of conceptual failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required section is missing or a parent chain is cyclic.
    InvalidModel,
    /// A required field, keyword or property was not supplied.
    MissingValue,
    /// A supplied value failed a domain check.
    InvalidValue,
    /// A lookup by name failed.
    NoSuchEntity,
    /// An insertion collided with an existing name.
    EntityExists,
    /// A deletion was blocked by a live reference.
    EntityInUse,
    /// A delete under policy `fail` found an outbound reference.
    HasReference,
    /// The command shape was rejected by the dispatcher.
    InvalidCommand,
    /// The external engine failed.
    EngineFailure,
    /// A model file could not be read or written.
    Io,
    /// An unexpected internal condition.
    Internal,
}

impl ModelError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the conceptual kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(e) => match e {
                ValidationError::InvalidModel { .. } | ValidationError::CyclicParent { .. } => {
                    ErrorKind::InvalidModel
                }
                ValidationError::MissingValue { .. }
                | ValidationError::MissingRequiredProperty { .. }
                | ValidationError::MissingProperty { .. } => ErrorKind::MissingValue,
                ValidationError::InvalidValue { .. } | ValidationError::SchemaConflict { .. } => {
                    ErrorKind::InvalidValue
                }
            },
            Self::Entity(e) => match e {
                EntityError::NotFound { .. } => ErrorKind::NoSuchEntity,
                EntityError::Exists { .. } => ErrorKind::EntityExists,
                EntityError::InUse { .. } => ErrorKind::EntityInUse,
                EntityError::HasReference { .. } => ErrorKind::HasReference,
            },
            Self::Command(_) => ErrorKind::InvalidCommand,
            Self::Engine(_) => ErrorKind::EngineFailure,
            Self::Io { .. } => ErrorKind::Io,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// Result type alias for gldmodel operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Terminal outcome of a top-level command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// The command completed.
    Ok,
    /// The command or its arguments were rejected.
    InvalidArguments,
    /// The external engine failed.
    EngineFailed,
    /// A model file could not be accessed.
    AccessError,
    /// A model file could not be parsed or is not a valid model.
    SyntaxError,
    /// An unexpected internal failure.
    UncaughtException,
}

impl ExitStatus {
    /// Numeric process exit code for this status.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::InvalidArguments => 1,
            Self::EngineFailed => 2,
            Self::AccessError => 3,
            Self::SyntaxError => 4,
            Self::UncaughtException => 5,
        }
    }
}

impl From<&ModelError> for ExitStatus {
    fn from(err: &ModelError) -> Self {
        match err.kind() {
            ErrorKind::InvalidModel => Self::SyntaxError,
            ErrorKind::EngineFailure => Self::EngineFailed,
            ErrorKind::Io => Self::AccessError,
            ErrorKind::Internal => Self::UncaughtException,
            ErrorKind::MissingValue
            | ErrorKind::InvalidValue
            | ErrorKind::NoSuchEntity
            | ErrorKind::EntityExists
            | ErrorKind::EntityInUse
            | ErrorKind::HasReference
            | ErrorKind::InvalidCommand => Self::InvalidArguments,
        }
    }
}
