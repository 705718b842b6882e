use serde::Deserialize;
use std::path::PathBuf;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RawKeywardConfig {
    #[serde(default)]
    pub keystone: RawKeystoneSection,

    #[serde(default)]
    pub policy: RawPolicySection,

    #[serde(default)]
    pub server: RawServerSection,
}

/// Keystone endpoint settings
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RawKeystoneSection {
    /// Keystone identity endpoint, with or without the /v3 suffix
    pub auth_url: Option<String>,

    /// PEM bundle trusted for the Keystone connection
    pub ca_file: Option<PathBuf>,

    /// Bound on Keystone calls and policy fetches
    pub timeout_secs: Option<u64>,
}

/// Where policies come from and how they are kept current
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RawPolicySection {
    pub file: Option<PathBuf>,

    /// Name of a ConfigMap in kube-system holding the policies
    pub config_map: Option<String>,

    pub kubeconfig: Option<PathBuf>,

    /// Refuse requests no rule matches instead of returning no opinion
    pub deny_by_default: Option<bool>,

    pub poll_interval_secs: Option<u64>,

    /// Reload the policy file when it changes on disk
    pub watch: Option<bool>,
}

/// Listener settings
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RawServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}
