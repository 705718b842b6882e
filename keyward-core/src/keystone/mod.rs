//! Keystone identity resolution
//!
//! An [`IdentityResolver`] turns a bearer token into an [`Identity`]. The
//! decision engine never calls it; the webhook transport does, and stops at an
//! [`AuthenticationError`].

mod client;
mod types;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::request::Identity;

pub use client::KeystoneClient;
pub use types::{ApiVersion, Token, TokenResponse, VersionResponse};

/// Token could not be turned into an identity
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("no token supplied")]
    MissingToken,

    #[error("token rejected by Keystone")]
    InvalidToken,

    #[error("Keystone unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected Keystone response: {0}")]
    InvalidResponse(String),
}

/// Keystone connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoneConfig {
    pub auth_url: String,
    pub ca_file: Option<PathBuf>,
    pub timeout: Duration,
}

/// Resolves caller credentials to identity attributes
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Identity, AuthenticationError>;
}
