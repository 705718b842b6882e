//! Policy loading from JSON or TOML text
//!
//! Loading is all-or-nothing: a single bad record rejects the whole document,
//! so a running service never ends up enforcing a truncated policy.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use super::{PolicyRule, RuleRecord, RuleSet};
use super::rule::InvalidRuleError;

/// Supported policy text encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    /// A top-level JSON array of rule objects
    Json,
    /// `[[rule]]` tables
    Toml,
}

impl PolicyFormat {
    /// Guess the format from the document's leading characters
    pub fn detect(raw: &str) -> Self {
        match raw.trim_start().strip_prefix('[') {
            Some(rest) => match rest.trim_start().chars().next() {
                Some('{') | Some(']') | None => Self::Json,
                _ => Self::Toml,
            },
            None => Self::Toml,
        }
    }
}

impl fmt::Display for PolicyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("JSON"),
            Self::Toml => f.write_str("TOML"),
        }
    }
}

/// Policy text could not be turned into a rule set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyParseError {
    /// The document itself is not well-formed
    #[error("malformed {format} policy: {message}")]
    Syntax {
        format: PolicyFormat,
        message: String,
    },

    /// A record has the wrong shape (unknown key, wrong type)
    #[error("rule {index}: {message}")]
    Record { index: usize, message: String },

    /// A record parsed but failed validation
    #[error("rule {index}: {source}")]
    InvalidRule {
        index: usize,
        #[source]
        source: InvalidRuleError,
    },
}

impl PolicyParseError {
    /// Position of the offending rule, when the failure is tied to one
    pub fn rule_index(&self) -> Option<usize> {
        match self {
            Self::Syntax { .. } => None,
            Self::Record { index, .. } | Self::InvalidRule { index, .. } => Some(*index),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPolicy {
    #[serde(default)]
    rule: Vec<toml::Value>,
}

/// Load policy text, detecting its format
pub fn load(raw: &str) -> Result<RuleSet, PolicyParseError> {
    load_as(raw, PolicyFormat::detect(raw))
}

/// Load policy text in a known format
pub fn load_as(raw: &str, format: PolicyFormat) -> Result<RuleSet, PolicyParseError> {
    let records = match format {
        PolicyFormat::Json => json_records(raw)?,
        PolicyFormat::Toml => toml_records(raw)?,
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            PolicyRule::try_from(record)
                .map_err(|source| PolicyParseError::InvalidRule { index, source })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(RuleSet::new)
}

fn json_records(raw: &str) -> Result<Vec<RuleRecord>, PolicyParseError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| PolicyParseError::Syntax {
            format: PolicyFormat::Json,
            message: e.to_string(),
        })?;

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<RuleRecord>(value).map_err(|e| PolicyParseError::Record {
                index,
                message: e.to_string(),
            })
        })
        .collect()
}

fn toml_records(raw: &str) -> Result<Vec<RuleRecord>, PolicyParseError> {
    let policy: TomlPolicy = toml::from_str(raw).map_err(|e| PolicyParseError::Syntax {
        format: PolicyFormat::Toml,
        message: e.to_string(),
    })?;

    policy
        .rule
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            value
                .try_into::<RuleRecord>()
                .map_err(|e| PolicyParseError::Record {
                    index,
                    message: e.to_string(),
                })
        })
        .collect()
}
