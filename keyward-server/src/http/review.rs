//! TokenReview and SubjectAccessReview wire types
//!
//! Only the fields the webhooks read or write are modelled. Unknown fields in
//! requests are ignored, as the API server may send more than we need.

use std::collections::BTreeMap;

use keyward_core::{Action, Authorization, Identity, MalformedRequestError, Verb};
use serde::{Deserialize, Serialize};

/// `user.extra` key carrying the Keystone project id
pub const EXTRA_PROJECT_ID: &str = "alpha.kubernetes.io/identity/project/id";
/// `user.extra` key carrying the Keystone project name
pub const EXTRA_PROJECT_NAME: &str = "alpha.kubernetes.io/identity/project/name";
/// `user.extra` key carrying the Keystone role names
pub const EXTRA_ROLES: &str = "alpha.kubernetes.io/identity/roles";
/// `user.extra` key carrying the user's Keystone domain name
pub const EXTRA_DOMAIN_NAME: &str = "alpha.kubernetes.io/identity/user/domain/name";

const AUTHENTICATION_API_VERSION: &str = "authentication.k8s.io/v1";
const AUTHORIZATION_API_VERSION: &str = "authorization.k8s.io/v1";

fn default_authentication_version() -> String {
    AUTHENTICATION_API_VERSION.to_string()
}

fn default_authorization_version() -> String {
    AUTHORIZATION_API_VERSION.to_string()
}

/// TokenReview as posted by the API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReview {
    #[serde(default = "default_authentication_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub spec: TokenReviewSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenReviewStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenReviewSpec {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReviewStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

impl TokenReview {
    /// Response carrying `status`, echoing the request's API version
    pub fn respond(&self, status: TokenReviewStatus) -> Self {
        Self {
            api_version: self.api_version.clone(),
            kind: "TokenReview".to_string(),
            spec: TokenReviewSpec::default(),
            status: Some(status),
        }
    }
}

impl TokenReviewStatus {
    pub fn authenticated(identity: &Identity) -> Self {
        Self {
            authenticated: true,
            user: Some(UserInfo::from(identity)),
            error: None,
        }
    }

    pub fn unauthenticated(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            user: None,
            error: Some(error.into()),
        }
    }
}

impl From<&Identity> for UserInfo {
    fn from(identity: &Identity) -> Self {
        let mut extra = BTreeMap::new();
        if !identity.project_id.is_empty() {
            extra.insert(EXTRA_PROJECT_ID.to_string(), vec![identity.project_id.clone()]);
        }
        if !identity.project_name.is_empty() {
            extra.insert(EXTRA_PROJECT_NAME.to_string(), vec![identity.project_name.clone()]);
        }
        if !identity.roles.is_empty() {
            extra.insert(EXTRA_ROLES.to_string(), identity.roles.iter().cloned().collect());
        }
        if !identity.domain_name.is_empty() {
            extra.insert(EXTRA_DOMAIN_NAME.to_string(), vec![identity.domain_name.clone()]);
        }

        let groups = if identity.project_id.is_empty() {
            Vec::new()
        } else {
            vec![identity.project_id.clone()]
        };

        Self {
            username: identity.user_name.clone(),
            uid: identity.user_id.clone(),
            groups,
            extra,
        }
    }
}

/// SubjectAccessReview as posted by the API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReview {
    #[serde(default = "default_authorization_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub spec: SubjectAccessReviewSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubjectAccessReviewStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReviewSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_attributes: Option<ResourceAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_resource_attributes: Option<NonResourceAttributes>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceAttributes {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub verb: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub subresource: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NonResourceAttributes {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub verb: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReviewStatus {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub denied: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl From<&Authorization> for SubjectAccessReviewStatus {
    fn from(authorization: &Authorization) -> Self {
        Self {
            allowed: authorization.allowed,
            denied: authorization.denied,
            reason: authorization.reason.clone(),
        }
    }
}

impl SubjectAccessReview {
    pub fn respond(&self, status: SubjectAccessReviewStatus) -> Self {
        Self {
            api_version: self.api_version.clone(),
            kind: "SubjectAccessReview".to_string(),
            spec: SubjectAccessReviewSpec::default(),
            status: Some(status),
        }
    }
}

impl SubjectAccessReviewSpec {
    fn first_extra(&self, key: &str) -> String {
        self.extra
            .get(key)
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_default()
    }

    /// Caller attributes, as set by the authentication webhook
    pub fn identity(&self) -> Identity {
        Identity {
            user_name: self.user.clone(),
            user_id: self.uid.clone(),
            domain_name: self.first_extra(EXTRA_DOMAIN_NAME),
            project_id: self.first_extra(EXTRA_PROJECT_ID),
            project_name: self.first_extra(EXTRA_PROJECT_NAME),
            roles: self
                .extra
                .get(EXTRA_ROLES)
                .map(|roles| roles.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    /// The operation under review
    pub fn action(&self) -> Result<Action, MalformedRequestError> {
        match (&self.resource_attributes, &self.non_resource_attributes) {
            (Some(_), Some(attrs)) => Err(MalformedRequestError::ConflictingAttributes {
                path: attrs.path.clone(),
            }),
            (None, None) => Err(MalformedRequestError::MissingTarget),
            (Some(attrs), None) => {
                let resource = if attrs.subresource.is_empty() {
                    attrs.resource.clone()
                } else {
                    format!("{}/{}", attrs.resource, attrs.subresource)
                };
                Ok(Action::resource(parse_verb(&attrs.verb)?, resource)
                    .with_api_group(attrs.group.as_str())
                    .in_namespace(attrs.namespace.as_str())
                    .named(attrs.name.as_str()))
            }
            (None, Some(attrs)) => Ok(Action::non_resource(
                parse_verb(&attrs.verb)?,
                attrs.path.as_str(),
            )),
        }
    }
}

fn parse_verb(raw: &str) -> Result<Verb, MalformedRequestError> {
    raw.parse::<Verb>()
        .map_err(|_| MalformedRequestError::UnknownVerb(raw.to_string()))
}
