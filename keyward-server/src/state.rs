//! Shared application state for the webhook server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyward_core::{
    Authorizer, DecisionEngine, IdentityResolver, KeystoneClient, PolicyReloader, ServiceConfig,
    source,
};

use crate::ServerError;

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Policy decisions
    pub authorizer: Arc<Authorizer>,
    /// Token to identity resolution
    pub resolver: Arc<dyn IdentityResolver>,
    /// Present only when a policy source is configured
    pub reloader: Option<Arc<PolicyReloader>>,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state from explicit components
    pub fn new(resolver: Arc<dyn IdentityResolver>, authorizer: Authorizer) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
            resolver,
            reloader: None,
            started_at: Utc::now(),
        }
    }

    /// Attach the reloader backing the authorizer's store
    pub fn with_reloader(mut self, reloader: Arc<PolicyReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// Build and check the Keystone client, open the policy source and perform the first load
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, ServerError> {
        let keystone = KeystoneClient::new(&config.keystone)?;
        keystone.discover().await?;
        let resolver: Arc<dyn IdentityResolver> = Arc::new(keystone);

        match source::open(&config.policy).await? {
            None => {
                tracing::warn!("no policy file or config map configured; authorization disabled");
                Ok(Self::new(resolver, Authorizer::disabled()))
            }
            Some(source) => {
                let reloader =
                    Arc::new(PolicyReloader::bootstrap(source, config.fetch_timeout).await);
                let authorizer = Authorizer::new(
                    Arc::clone(reloader.store()),
                    DecisionEngine::new(config.fallback),
                );
                Ok(Self::new(resolver, authorizer).with_reloader(reloader))
            }
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
