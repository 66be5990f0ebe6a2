//! Name patterns used by the `get_*` lookups.
//!
//! A pattern is a regular expression matched at the start of a name, so
//! `"triplex_"` selects `triplex_meter` but not `meter_triplex`.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::ValidationError;

/// A compiled, start-anchored name pattern.
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    /// Compiles a pattern.
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
            ValidationError::invalid("pattern", format!("invalid regex '{pattern}': {e}"))
        })?;
        Ok(Self { regex })
    }

    /// Returns true if the name matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Selects entries of a named collection whose key matches `pattern`
/// (all entries when `pattern` is `None`) and that satisfy `keep`.
pub(crate) fn select<'a, T>(
    collection: &'a BTreeMap<String, T>,
    pattern: Option<&str>,
    keep: impl Fn(&T) -> bool,
) -> Result<BTreeMap<&'a str, &'a T>, ValidationError> {
    let pattern = pattern.map(NamePattern::new).transpose()?;
    Ok(collection
        .iter()
        .filter(|(name, _)| pattern.as_ref().map_or(true, |p| p.matches(name)))
        .filter(|(_, value)| keep(value))
        .map(|(name, value)| (name.as_str(), value))
        .collect())
}
