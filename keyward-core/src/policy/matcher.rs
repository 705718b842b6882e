//! Field matchers for policy rules
//!
//! Every action field a rule constrains is either a literal or the explicit
//! wildcard `"*"`. Keeping the two apart as variants means a malformed policy
//! fails at load time rather than surprising anyone at evaluation time.

use std::fmt;

use super::Verb;

/// The wildcard token accepted in policy text
pub const WILDCARD: &str = "*";

/// A single rule field: match anything, or match one literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher<T> {
    /// Matches any non-empty value, including the wildcard itself
    Any,
    /// Matches exactly this value (case-sensitive)
    Exact(T),
}

impl<T> Matcher<T> {
    /// Returns true for the wildcard variant
    pub fn is_any(&self) -> bool {
        matches!(self, Matcher::Any)
    }

    /// The literal value, if any
    pub fn literal(&self) -> Option<&T> {
        match self {
            Matcher::Any => None,
            Matcher::Exact(value) => Some(value),
        }
    }
}

impl Matcher<String> {
    /// Parse a policy-text value; `"*"` becomes [`Matcher::Any`]
    pub fn parse(raw: &str) -> Self {
        if raw == WILDCARD {
            Matcher::Any
        } else {
            Matcher::Exact(raw.to_string())
        }
    }

    /// Test a request field against this matcher
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Any => !value.is_empty(),
            Matcher::Exact(expected) => expected == value,
        }
    }
}

impl Matcher<Verb> {
    /// Test a request verb against this matcher
    pub fn matches(&self, verb: Verb) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Exact(expected) => *expected == verb,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str(WILDCARD),
            Matcher::Exact(value) => value.fmt(f),
        }
    }
}
