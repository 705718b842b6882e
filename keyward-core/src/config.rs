//! Service configuration
//!
//! [`ServiceSettings`] is the flat, merged view of config file and command
//! line. [`ServiceSettings::validate`] turns it into a [`ServiceConfig`] or
//! refuses with a [`ConfigError`]; nothing starts until that succeeds.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::Fallback;
use crate::keystone::KeystoneConfig;

/// Default bound on Keystone calls and policy fetches
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Fatal configuration problems, reported before the service starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Auth URL is empty")]
    EmptyAuthUrl,

    #[error("policy file and config map are mutually exclusive")]
    ConflictingPolicySources,

    #[error("config map {0} requires a kubeconfig")]
    MissingKubeConfig(String),

    #[error("cannot use CA bundle {}: {message}", path.display())]
    CaBundle { path: PathBuf, message: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Unable to find identity API v3 version: {0}")]
    IdentityVersion(String),

    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error("watching for changes requires a policy file")]
    WatchRequiresPolicyFile,
}

/// Where policy text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySourceConfig {
    /// No source: authorization is disabled
    Disabled,
    File(PathBuf),
    ConfigMap { name: String, kube_config: PathBuf },
}

impl PolicySourceConfig {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

/// Unvalidated settings, as merged from config file and flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    pub auth_url: String,
    pub ca_file: Option<PathBuf>,
    pub policy_file: Option<PathBuf>,
    pub config_map: Option<String>,
    pub kube_config: Option<PathBuf>,
    pub deny_by_default: bool,
    pub poll_interval_secs: Option<u64>,
    pub watch: bool,
    pub timeout_secs: Option<u64>,
}

/// Validated configuration the service runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub keystone: KeystoneConfig,
    pub policy: PolicySourceConfig,
    pub fallback: Fallback,
    pub poll_interval: Option<Duration>,
    pub watch: bool,
    pub fetch_timeout: Duration,
}

impl ServiceSettings {
    pub fn validate(self) -> Result<ServiceConfig, ConfigError> {
        let auth_url = self.auth_url.trim().to_string();
        if auth_url.is_empty() {
            return Err(ConfigError::EmptyAuthUrl);
        }

        if let Some(path) = &self.ca_file
            && !path.is_file()
        {
            return Err(ConfigError::CaBundle {
                path: path.clone(),
                message: "file not found".to_string(),
            });
        }

        let policy = match (self.policy_file, self.config_map) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingPolicySources),
            (Some(path), None) => PolicySourceConfig::File(path),
            (None, Some(name)) => match self.kube_config {
                Some(kube_config) => PolicySourceConfig::ConfigMap { name, kube_config },
                None => return Err(ConfigError::MissingKubeConfig(name)),
            },
            (None, None) => PolicySourceConfig::Disabled,
        };

        if self.watch && !matches!(policy, PolicySourceConfig::File(_)) {
            return Err(ConfigError::WatchRequiresPolicyFile);
        }

        let poll_interval = match self.poll_interval_secs {
            Some(0) => return Err(ConfigError::InvalidPollInterval),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let timeout = match self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => return Err(ConfigError::InvalidTimeout),
            secs => Duration::from_secs(secs),
        };

        Ok(ServiceConfig {
            keystone: KeystoneConfig {
                auth_url,
                ca_file: self.ca_file,
                timeout,
            },
            policy,
            fallback: Fallback::from_deny_by_default(self.deny_by_default),
            poll_interval,
            watch: self.watch,
            fetch_timeout: timeout,
        })
    }
}
