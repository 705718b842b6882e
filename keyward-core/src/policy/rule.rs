//! Policy rule model
//!
//! [`RuleRecord`] is the loosely-typed shape found in policy text.
//! [`PolicyRule`] is the validated, closed form the engine evaluates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::matcher::{Matcher, WILDCARD};

/// A rule failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct InvalidRuleError {
    /// Policy-text name of the offending field
    pub field: String,
    /// Why it was rejected
    pub reason: String,
}

impl InvalidRuleError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Kubernetes request verbs understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Patch,
    Delete,
    DeleteCollection,
    /// A request for "every verb", e.g. `kubectl auth can-i '*' pods`
    All,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Watch => "watch",
            Self::Create => "create",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::DeleteCollection => "deletecollection",
            Self::All => WILDCARD,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Self::Get),
            "list" => Ok(Self::List),
            "watch" => Ok(Self::Watch),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            "deletecollection" => Ok(Self::DeleteCollection),
            WILDCARD => Ok(Self::All),
            other => Err(format!("unknown verb: {other}")),
        }
    }
}

/// What a matching rule decides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// One rule as written in policy text (JSON object or TOML table)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    #[serde(default, alias = "api_group", skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, alias = "resource_name", skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(
        default,
        alias = "non_resource_path",
        skip_serializing_if = "Option::is_none"
    )]
    pub non_resource_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Effect>,
}

/// A validated authorization rule
///
/// A field set to `None` places no constraint on the request. A field set to
/// [`Matcher::Any`] requires the request to carry some non-empty value.
/// Identity lists are ordered sets where empty means "anyone".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRule {
    pub users: Vec<String>,
    pub roles: Vec<String>,
    pub projects: Vec<String>,
    pub verb: Option<Matcher<Verb>>,
    pub api_group: Option<Matcher<String>>,
    pub resource: Option<Matcher<String>>,
    pub namespace: Option<Matcher<String>>,
    pub resource_name: Option<Matcher<String>>,
    pub non_resource_path: Option<Matcher<String>>,
    pub effect: Effect,
}

impl PolicyRule {
    /// Rule allowing everything matched by the rest of the builder chain
    pub fn allow() -> Self {
        Self::default()
    }

    /// Rule denying everything matched by the rest of the builder chain
    pub fn deny() -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::default()
        }
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_verb(mut self, verb: Matcher<Verb>) -> Self {
        self.verb = Some(verb);
        self
    }

    pub fn with_api_group(mut self, group: &str) -> Self {
        self.api_group = Some(Matcher::parse(group));
        self
    }

    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resource = Some(Matcher::parse(resource));
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(Matcher::parse(namespace));
        self
    }

    pub fn with_resource_name(mut self, name: &str) -> Self {
        self.resource_name = Some(Matcher::parse(name));
        self
    }

    pub fn with_non_resource_path(mut self, path: &str) -> Self {
        self.non_resource_path = Some(Matcher::parse(path));
        self
    }

    /// Whether the rule constrains any resource-oriented field
    pub fn targets_resources(&self) -> bool {
        self.api_group.is_some()
            || self.resource.is_some()
            || self.namespace.is_some()
            || self.resource_name.is_some()
    }

    /// Whether the rule constrains a non-resource URL path
    pub fn targets_non_resource(&self) -> bool {
        self.non_resource_path.is_some()
    }

    /// Check the rule for contradictions and missing predicates
    pub fn validate(&self) -> Result<(), InvalidRuleError> {
        let has_identity =
            !self.users.is_empty() || !self.roles.is_empty() || !self.projects.is_empty();
        let has_action =
            self.verb.is_some() || self.targets_resources() || self.targets_non_resource();
        if !has_identity && !has_action {
            return Err(InvalidRuleError::new(
                "rule",
                "rule has no predicates; write \"*\" wildcards explicitly to match everything",
            ));
        }

        if self.targets_non_resource() && self.targets_resources() {
            return Err(InvalidRuleError::new(
                "nonResourcePath",
                "cannot be combined with apiGroup, resource, namespace or resourceName",
            ));
        }

        for (field, values) in [
            ("users", &self.users),
            ("roles", &self.roles),
            ("projects", &self.projects),
        ] {
            if values.iter().any(|value| value.is_empty()) {
                return Err(InvalidRuleError::new(field, "entries must not be empty"));
            }
        }

        for (field, matcher) in [
            ("apiGroup", &self.api_group),
            ("resource", &self.resource),
            ("namespace", &self.namespace),
            ("resourceName", &self.resource_name),
            ("nonResourcePath", &self.non_resource_path),
        ] {
            if let Some(Matcher::Exact(value)) = matcher
                && value.is_empty()
            {
                return Err(InvalidRuleError::new(
                    field,
                    "empty value; use \"*\" to match any value",
                ));
            }
        }

        if let Some(Matcher::Exact(path)) = &self.non_resource_path
            && !path.starts_with('/')
        {
            return Err(InvalidRuleError::new(
                "nonResourcePath",
                format!("path must start with '/': {path}"),
            ));
        }

        Ok(())
    }
}

fn parse_field(field: &str, raw: Option<&String>) -> Result<Option<Matcher<String>>, InvalidRuleError> {
    match raw {
        None => Ok(None),
        Some(value) if value.is_empty() => Err(InvalidRuleError::new(
            field,
            "empty value; use \"*\" to match any value",
        )),
        Some(value) => Ok(Some(Matcher::parse(value))),
    }
}

impl TryFrom<&RuleRecord> for PolicyRule {
    type Error = InvalidRuleError;

    fn try_from(record: &RuleRecord) -> Result<Self, Self::Error> {
        let verb = match record.verb.as_deref() {
            None => None,
            Some(WILDCARD) => Some(Matcher::Any),
            Some(raw) => Some(Matcher::Exact(
                raw.parse::<Verb>()
                    .map_err(|reason| InvalidRuleError::new("verb", reason))?,
            )),
        };

        let rule = PolicyRule {
            users: record.users.clone(),
            roles: record.roles.clone(),
            projects: record.projects.clone(),
            verb,
            api_group: parse_field("apiGroup", record.api_group.as_ref())?,
            resource: parse_field("resource", record.resource.as_ref())?,
            namespace: parse_field("namespace", record.namespace.as_ref())?,
            resource_name: parse_field("resourceName", record.resource_name.as_ref())?,
            non_resource_path: parse_field("nonResourcePath", record.non_resource_path.as_ref())?,
            effect: record.effect.unwrap_or_default(),
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl From<&PolicyRule> for RuleRecord {
    fn from(rule: &PolicyRule) -> Self {
        let render = |m: &Option<Matcher<String>>| m.as_ref().map(ToString::to_string);
        RuleRecord {
            users: rule.users.clone(),
            roles: rule.roles.clone(),
            projects: rule.projects.clone(),
            verb: rule.verb.as_ref().map(ToString::to_string),
            api_group: render(&rule.api_group),
            resource: render(&rule.resource),
            namespace: render(&rule.namespace),
            resource_name: render(&rule.resource_name),
            non_resource_path: render(&rule.non_resource_path),
            effect: Some(rule.effect),
        }
    }
}
