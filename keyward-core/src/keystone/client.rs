//! Keystone v3 HTTP client

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{AuthenticationError, IdentityResolver, KeystoneConfig, TokenResponse, VersionResponse};
use crate::config::ConfigError;
use crate::request::Identity;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Validates tokens against the Keystone v3 API
#[derive(Debug, Clone)]
pub struct KeystoneClient {
    http: reqwest::Client,
    base_url: String,
}

impl KeystoneClient {
    pub fn new(config: &KeystoneConfig) -> Result<Self, ConfigError> {
        let base_url = identity_v3_base(&config.auth_url)?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(path) = &config.ca_file {
            let ca_error = |message: String| ConfigError::CaBundle {
                path: path.clone(),
                message,
            };
            let pem = std::fs::read(path).map_err(|e| ca_error(e.to_string()))?;
            let certificates =
                reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| ca_error(e.to_string()))?;
            if certificates.is_empty() {
                return Err(ca_error("no certificates found".to_string()));
            }
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        tracing::info!(endpoint = %base_url, "using Keystone identity v3");
        Ok(Self { http, base_url })
    }

    /// Identity v3 base URL, e.g. `https://keystone:5000/v3`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the endpoint serves the identity v3 API
    ///
    /// Run once at startup so a wrong auth URL fails there rather than on
    /// every TokenReview.
    pub async fn discover(&self) -> Result<(), ConfigError> {
        let response = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| ConfigError::IdentityVersion(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConfigError::IdentityVersion(format!(
                "{} returned {}",
                self.base_url,
                response.status()
            )));
        }

        let body: VersionResponse = response.json().await.map_err(|e| {
            ConfigError::IdentityVersion(format!("{} is not a version document: {e}", self.base_url))
        })?;
        if !body.version.is_v3() {
            return Err(ConfigError::IdentityVersion(format!(
                "{} reports version {}",
                self.base_url, body.version.id
            )));
        }

        tracing::info!(
            version = %body.version.id,
            status = body.version.status.as_deref().unwrap_or("unknown"),
            "Keystone identity API discovered"
        );
        Ok(())
    }

    fn tokens_url(&self) -> String {
        format!("{}/auth/tokens", self.base_url)
    }
}

/// Normalise an auth URL to its `/v3` base
fn identity_v3_base(auth_url: &str) -> Result<String, ConfigError> {
    let trimmed = auth_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyAuthUrl);
    }
    if trimmed.ends_with("/v3") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/v3"))
    }
}

#[async_trait]
impl IdentityResolver for KeystoneClient {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthenticationError> {
        if token.is_empty() {
            return Err(AuthenticationError::MissingToken);
        }

        // A valid token may inspect itself
        let response = self
            .http
            .get(self.tokens_url())
            .header(AUTH_TOKEN_HEADER, token)
            .header(SUBJECT_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| AuthenticationError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                return Err(AuthenticationError::InvalidToken);
            }
            status => {
                return Err(AuthenticationError::Unavailable(format!(
                    "Keystone returned {status}"
                )));
            }
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthenticationError::InvalidResponse(e.to_string()))?;
        let identity = Identity::from(body.token);
        if identity.user_name.is_empty() {
            return Err(AuthenticationError::InvalidResponse(
                "token has no user name".to_string(),
            ));
        }

        tracing::debug!(
            user = %identity.user_name,
            project = %identity.project_name,
            roles = identity.roles.len(),
            "resolved Keystone identity"
        );
        Ok(identity)
    }
}
