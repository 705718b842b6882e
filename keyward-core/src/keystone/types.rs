//! Keystone v3 token response bodies

use serde::Deserialize;

use crate::request::Identity;

/// Body of `GET /v3`, the identity v3 version document
#[derive(Debug, Clone, Deserialize)]
pub struct VersionResponse {
    pub version: ApiVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVersion {
    /// e.g. `v3.14`
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ApiVersion {
    pub fn is_v3(&self) -> bool {
        self.id == "v3" || self.id.starts_with("v3.")
    }
}

/// Body of `GET /v3/auth/tokens`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: Token,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub user: TokenUser,
    /// Absent for unscoped and domain-scoped tokens
    #[serde(default)]
    pub project: Option<TokenProject>,
    #[serde(default)]
    pub roles: Vec<TokenRole>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: Option<TokenDomain>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenDomain {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRole {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

impl From<Token> for Identity {
    fn from(token: Token) -> Self {
        let domain_name = token
            .user
            .domain
            .and_then(|domain| domain.name)
            .unwrap_or_default();
        let (project_id, project_name) = token
            .project
            .map(|project| (project.id, project.name))
            .unwrap_or_default();

        Identity {
            user_name: token.user.name,
            user_id: token.user.id,
            domain_name,
            project_id,
            project_name,
            roles: token.roles.into_iter().map(|role| role.name).collect(),
        }
    }
}
