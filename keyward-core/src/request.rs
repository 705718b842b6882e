//! Request attributes: who is calling and what they want to do

use std::collections::BTreeSet;

use thiserror::Error;

use crate::policy::Verb;

/// A request cannot be evaluated because its attributes contradict each other
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRequestError {
    #[error("request carries both resource attributes and non-resource path {path}")]
    ConflictingAttributes { path: String },

    #[error("request names neither a resource nor a non-resource path")]
    MissingTarget,

    #[error("request has no user name")]
    MissingUser,

    #[error("unknown verb: {0}")]
    UnknownVerb(String),
}

/// Caller attributes resolved from Keystone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_name: String,
    pub user_id: String,
    pub domain_name: String,
    pub project_id: String,
    pub project_name: String,
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = id.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_name = domain.into();
        self
    }

    pub fn with_project(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.project_id = id.into();
        self.project_name = name.into();
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
}

/// The operation under review
///
/// Empty strings mean "not set". Resource requests carry a resource (and
/// optionally group, namespace and name); non-resource requests carry only a
/// path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub verb: Verb,
    pub api_group: String,
    pub resource: String,
    pub namespace: String,
    pub resource_name: String,
    pub non_resource_path: String,
}

impl Action {
    /// A resource request, e.g. `get pods`
    pub fn resource(verb: Verb, resource: impl Into<String>) -> Self {
        Self {
            verb,
            api_group: String::new(),
            resource: resource.into(),
            namespace: String::new(),
            resource_name: String::new(),
            non_resource_path: String::new(),
        }
    }

    /// A non-resource request, e.g. `get /healthz`
    pub fn non_resource(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            api_group: String::new(),
            resource: String::new(),
            namespace: String::new(),
            resource_name: String::new(),
            non_resource_path: path.into(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_api_group(mut self, group: impl Into<String>) -> Self {
        self.api_group = group.into();
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.resource_name = name.into();
        self
    }

    pub fn with_non_resource_path(mut self, path: impl Into<String>) -> Self {
        self.non_resource_path = path.into();
        self
    }

    fn has_resource_attributes(&self) -> bool {
        !self.api_group.is_empty()
            || !self.resource.is_empty()
            || !self.namespace.is_empty()
            || !self.resource_name.is_empty()
    }

    /// True for requests against a non-resource URL
    pub fn is_non_resource(&self) -> bool {
        !self.non_resource_path.is_empty()
    }

    pub fn validate(&self) -> Result<(), MalformedRequestError> {
        if self.is_non_resource() {
            if self.has_resource_attributes() {
                return Err(MalformedRequestError::ConflictingAttributes {
                    path: self.non_resource_path.clone(),
                });
            }
            return Ok(());
        }
        if self.resource.is_empty() {
            return Err(MalformedRequestError::MissingTarget);
        }
        Ok(())
    }
}
