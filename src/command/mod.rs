//! Command layer.
//!
//! A command is `verb [component] args...`, where `key=value` tokens are
//! keyword arguments and every other token is positional. The
//! [`Dispatcher`] checks the shape of a command against [`ROUTES`], resolves
//! the (verb, component) pair through a static handler table and runs the
//! handler against the current model.

mod dispatch;
mod routes;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use dispatch::{Dispatcher, Outcome};
pub use routes::{route, Route, ROUTES};

use crate::error::CommandError;

/// Command verbs.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Delete,
    /// Also spelled `add`.
    Insert,
    Update,
    Search,
}

impl Verb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "insert" | "add" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "search" => Ok(Self::Search),
            other => Err(CommandError::UnknownVerb {
                verb: other.to_string(),
            }),
        }
    }
}

/// The part of the model a command addresses.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Model,
    Module,
    Class,
    Object,
    Global,
    Schedule,
    Filter,
    Type,
    Header,
    Property,
}

impl Component {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Module => "module",
            Self::Class => "class",
            Self::Object => "object",
            Self::Global => "global",
            Self::Schedule => "schedule",
            Self::Filter => "filter",
            Self::Type => "type",
            Self::Header => "header",
            Self::Property => "property",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "module" => Ok(Self::Module),
            "class" => Ok(Self::Class),
            "object" => Ok(Self::Object),
            "global" => Ok(Self::Global),
            "schedule" => Ok(Self::Schedule),
            "filter" => Ok(Self::Filter),
            "type" => Ok(Self::Type),
            "header" => Ok(Self::Header),
            "property" => Ok(Self::Property),
            other => Err(CommandError::UnknownComponent {
                component: other.to_string(),
            }),
        }
    }
}

/// A parsed command.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub component: Option<Component>,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

impl Command {
    /// Creates a command with no arguments.
    #[must_use]
    pub const fn new(verb: Verb, component: Option<Component>) -> Self {
        Self {
            verb,
            component,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Parses `verb [component] args...`.
    ///
    /// A token containing `=` with a non-empty key is a keyword argument;
    /// only the first `=` splits. The token after the verb is the component
    /// unless it is a keyword argument.
    pub fn parse<I, S>(tokens: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = tokens.into_iter();
        let verb: Verb = match tokens.next() {
            Some(token) => token.as_ref().parse()?,
            None => return Err(CommandError::Empty),
        };

        let mut command = Self::new(verb, None);
        let mut first = true;
        for token in tokens {
            let token = token.as_ref();
            match split_keyword(token) {
                Some((key, value)) => {
                    command.kwargs.insert(key.to_string(), value.to_string());
                }
                None if first => command.component = Some(token.parse()?),
                None => command.args.push(token.to_string()),
            }
            first = false;
        }
        Ok(command)
    }

    /// Positional argument `index`, if supplied.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Keyword argument `key`, if supplied.
    #[must_use]
    pub fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }
}

fn split_keyword(token: &str) -> Option<(&str, &str)> {
    token.split_once('=').filter(|(key, _)| !key.is_empty())
}
