use super::types::{RawKeystoneSection, RawKeywardConfig, RawPolicySection, RawServerSection};
use anyhow::{Context, Result};
use keyward_core::ServiceSettings;
use keyward_server::{DEFAULT_PORT, ServerConfig};
use std::path::{Path, PathBuf};

/// Default bind address for the webhook
pub const DEFAULT_HOST: &str = "0.0.0.0";

pub struct ConfigLoader;

/// Configuration with defaults applied, ready for validation
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub service: ServiceSettings,
    pub server: ServerConfig,
}

impl ConfigLoader {
    /// Load the config file
    ///
    /// An explicit path must exist. Without one, the user config file is
    /// read when present and an empty config is used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<RawKeywardConfig> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::user_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(RawKeywardConfig::default()),
            },
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(raw)
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keyward").join("config.toml"))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    pub fn merge_raw(base: RawKeywardConfig, overlay: RawKeywardConfig) -> RawKeywardConfig {
        RawKeywardConfig {
            keystone: RawKeystoneSection {
                auth_url: overlay.keystone.auth_url.or(base.keystone.auth_url),
                ca_file: overlay.keystone.ca_file.or(base.keystone.ca_file),
                timeout_secs: overlay.keystone.timeout_secs.or(base.keystone.timeout_secs),
            },
            policy: RawPolicySection {
                file: overlay.policy.file.or(base.policy.file),
                config_map: overlay.policy.config_map.or(base.policy.config_map),
                kubeconfig: overlay.policy.kubeconfig.or(base.policy.kubeconfig),
                deny_by_default: overlay
                    .policy
                    .deny_by_default
                    .or(base.policy.deny_by_default),
                poll_interval_secs: overlay
                    .policy
                    .poll_interval_secs
                    .or(base.policy.poll_interval_secs),
                watch: overlay.policy.watch.or(base.policy.watch),
            },
            server: RawServerSection {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    pub fn finalize(raw: RawKeywardConfig) -> LoadedConfig {
        LoadedConfig {
            service: ServiceSettings {
                auth_url: raw.keystone.auth_url.unwrap_or_default(),
                ca_file: raw.keystone.ca_file,
                policy_file: raw.policy.file,
                config_map: raw.policy.config_map,
                kube_config: raw.policy.kubeconfig,
                deny_by_default: raw.policy.deny_by_default.unwrap_or(false),
                poll_interval_secs: raw.policy.poll_interval_secs,
                watch: raw.policy.watch.unwrap_or(false),
                timeout_secs: raw.keystone.timeout_secs,
            },
            server: ServerConfig {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
            },
        }
    }
}
