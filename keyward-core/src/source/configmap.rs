//! Policy text from a Kubernetes config map

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};

use super::{POLICY_KEY, POLICY_NAMESPACE, PolicySource, SourceError};

/// Reads the `policies` key of a config map in `kube-system`
#[derive(Clone)]
pub struct ConfigMapPolicySource {
    api: Api<ConfigMap>,
    name: String,
}

impl ConfigMapPolicySource {
    /// Build a cluster client from `kube_config` and check it can reach the API server
    pub async fn connect(name: &str, kube_config: &Path) -> Result<Self, SourceError> {
        let kubeconfig = Kubeconfig::read_from(kube_config).map_err(|e| {
            SourceError::Kubernetes(format!(
                "failed to read kubeconfig {}: {e}",
                kube_config.display()
            ))
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| SourceError::Kubernetes(format!("failed to load kubeconfig: {e}")))?;
        let client = Client::try_from(config)
            .map_err(|e| SourceError::Kubernetes(format!("failed to create client: {e}")))?;

        let version = client
            .apiserver_version()
            .await
            .map_err(|e| SourceError::Kubernetes(format!("API server unreachable: {e}")))?;
        tracing::info!(
            version = %format!("v{}.{}", version.major, version.minor),
            "Kubernetes API client created"
        );

        Ok(Self::with_client(client, name))
    }

    pub fn with_client(client: Client, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, POLICY_NAMESPACE),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl PolicySource for ConfigMapPolicySource {
    async fn fetch(&self) -> Result<String, SourceError> {
        let config_map = self
            .api
            .get(&self.name)
            .await
            .map_err(|e| SourceError::Kubernetes(e.to_string()))?;

        config_map
            .data
            .and_then(|mut data| data.remove(POLICY_KEY))
            .ok_or_else(|| SourceError::MissingKey {
                namespace: POLICY_NAMESPACE.to_string(),
                name: self.name.clone(),
                key: POLICY_KEY.to_string(),
            })
    }

    fn describe(&self) -> String {
        format!("config map {POLICY_NAMESPACE}/{}", self.name)
    }
}
