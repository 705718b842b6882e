//! Serve command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use keyward_server::KeywardServer;

use crate::config::{
    ConfigLoader, LoadedConfig, RawKeystoneSection, RawKeywardConfig, RawPolicySection,
    RawServerSection,
};

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Config file (defaults to the user config file when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keystone identity endpoint
    #[arg(long)]
    pub auth_url: Option<String>,

    /// PEM CA bundle for the Keystone connection
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    /// Policy file (JSON or TOML)
    #[arg(long, conflicts_with = "config_map")]
    pub policy_file: Option<PathBuf>,

    /// ConfigMap in kube-system holding the policies
    #[arg(long)]
    pub config_map: Option<String>,

    /// Kubeconfig used to read the ConfigMap
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Host address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Deny requests that no policy rule matches
    #[arg(long)]
    pub deny_by_default: bool,

    /// Re-read the policy source every N seconds
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Reload the policy file when it changes
    #[arg(long)]
    pub watch: bool,
}

impl ServeArgs {
    /// Flags as a config layer; switches only count when given
    fn overlay(&self) -> RawKeywardConfig {
        RawKeywardConfig {
            keystone: RawKeystoneSection {
                auth_url: self.auth_url.clone(),
                ca_file: self.ca_file.clone(),
                timeout_secs: None,
            },
            policy: RawPolicySection {
                file: self.policy_file.clone(),
                config_map: self.config_map.clone(),
                kubeconfig: self.kubeconfig.clone(),
                deny_by_default: self.deny_by_default.then_some(true),
                poll_interval_secs: self.poll_interval_secs,
                watch: self.watch.then_some(true),
            },
            server: RawServerSection {
                host: self.host.clone(),
                port: self.port,
            },
        }
    }

    /// Merge the config file under these flags
    fn resolve(&self) -> Result<LoadedConfig> {
        let file = ConfigLoader::load(self.config.as_deref())?;
        Ok(ConfigLoader::finalize(ConfigLoader::merge_raw(
            file,
            self.overlay(),
        )))
    }
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let LoadedConfig { service, server } = args.resolve()?;
    let service = service.validate().context("Invalid configuration")?;

    if service.policy.is_disabled() {
        tracing::warn!("No policy source configured; authorization is disabled");
    }

    KeywardServer::from_config(server, &service)
        .await
        .context("Failed to start keyward server")?
        .run()
        .await?;

    Ok(())
}
