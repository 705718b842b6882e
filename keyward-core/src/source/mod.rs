//! Policy sources
//!
//! A source produces raw policy text. It knows nothing about parsing; the
//! reloader hands whatever it returns to the loader.

#[cfg(feature = "configmap")]
mod configmap;
mod file;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::PolicySourceConfig;

#[cfg(feature = "configmap")]
pub use configmap::ConfigMapPolicySource;
pub use file::FilePolicySource;

/// Namespace policy config maps are read from
pub const POLICY_NAMESPACE: &str = "kube-system";

/// Config map key holding the policy text
pub const POLICY_KEY: &str = "policies";

/// Fetching policy text failed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config map {namespace}/{name} has no key {key}")]
    MissingKey {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("kubernetes error: {0}")]
    Kubernetes(String),

    #[error("policy fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported policy source: {0}")]
    Unsupported(String),
}

/// Something that can produce the current policy text
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Fetch the full policy text
    async fn fetch(&self) -> Result<String, SourceError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// Local file worth watching for changes, if any
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}

/// Build the source named by the configuration; `None` when disabled
pub async fn open(config: &PolicySourceConfig) -> Result<Option<Arc<dyn PolicySource>>, SourceError> {
    match config {
        PolicySourceConfig::Disabled => Ok(None),
        PolicySourceConfig::File(path) => Ok(Some(Arc::new(FilePolicySource::new(path)))),
        PolicySourceConfig::ConfigMap { name, kube_config } => {
            #[cfg(feature = "configmap")]
            {
                let source = ConfigMapPolicySource::connect(name, kube_config).await?;
                Ok(Some(Arc::new(source)))
            }
            #[cfg(not(feature = "configmap"))]
            {
                let _ = kube_config;
                Err(SourceError::Unsupported(format!(
                    "config map {name} (built without the `configmap` feature)"
                )))
            }
        }
    }
}
