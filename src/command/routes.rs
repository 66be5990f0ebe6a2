//! Routing table: per-verb shape requirements.

use super::Verb;

/// Shape requirements of one verb.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub verb: Verb,
    /// Whether the command operates on an existing model.
    pub input: bool,
    pub min_args: usize,
    pub min_kwargs: usize,
}

/// One entry per verb.
pub const ROUTES: [Route; 5] = [
    Route {
        verb: Verb::Create,
        input: false,
        min_args: 0,
        min_kwargs: 0,
    },
    Route {
        verb: Verb::Delete,
        input: true,
        min_args: 1,
        min_kwargs: 0,
    },
    Route {
        verb: Verb::Insert,
        input: true,
        min_args: 1,
        min_kwargs: 0,
    },
    Route {
        verb: Verb::Update,
        input: true,
        min_args: 1,
        min_kwargs: 1,
    },
    Route {
        verb: Verb::Search,
        input: true,
        min_args: 0,
        min_kwargs: 0,
    },
];

/// Returns the route of a verb.
#[must_use]
pub fn route(verb: Verb) -> &'static Route {
    match verb {
        Verb::Create => &ROUTES[0],
        Verb::Delete => &ROUTES[1],
        Verb::Insert => &ROUTES[2],
        Verb::Update => &ROUTES[3],
        Verb::Search => &ROUTES[4],
    }
}
