//! keyward-server - Kubernetes webhook server for Keystone authentication and policy authorization
//!
//! Serves the TokenReview and SubjectAccessReview webhooks the API server
//! calls, plus health and manual reload endpoints. Policy reloading runs in
//! the background while the server is up.

mod error;
pub mod http;
mod state;

use std::sync::Arc;
use std::time::Duration;

use keyward_core::{PolicyFileWatcher, ServiceConfig, reload::DEFAULT_DEBOUNCE_MS};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use error::ServerError;
pub use http::create_router;
pub use state::AppState;

/// The webhook server
pub struct KeywardServer {
    config: ServerConfig,
    state: Arc<AppState>,
    triggers: ReloadTriggers,
}

/// Background reload settings
#[derive(Debug, Clone, Copy, Default)]
struct ReloadTriggers {
    poll_interval: Option<Duration>,
    watch: bool,
}

impl KeywardServer {
    /// Build the server from validated service configuration
    pub async fn from_config(
        config: ServerConfig,
        service: &ServiceConfig,
    ) -> Result<Self, ServerError> {
        let state = Arc::new(AppState::from_config(service).await?);
        Ok(Self {
            config,
            state,
            triggers: ReloadTriggers {
                poll_interval: service.poll_interval,
                watch: service.watch,
            },
        })
    }

    /// Create a server with custom state (for testing)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self {
            config,
            state,
            triggers: ReloadTriggers::default(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("keyward server listening on {}", addr);
        self.run_with_listener(listener).await
    }

    /// Run the server on an already-bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let (poller, _watcher) = self.start_reload_triggers()?;

        let router = create_router(self.state);
        let served = axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        if let Some(poller) = poller {
            poller.abort();
        }
        served
    }

    /// Start polling and file watching, as configured
    fn start_reload_triggers(
        &self,
    ) -> Result<(Option<JoinHandle<()>>, Option<PolicyFileWatcher>), ServerError> {
        let Some(reloader) = &self.state.reloader else {
            return Ok((None, None));
        };

        let poller = self
            .triggers
            .poll_interval
            .map(|interval| reloader.spawn_polling(interval));

        let watcher = match reloader.source().watch_path() {
            Some(path) if self.triggers.watch => {
                let path = path.to_path_buf();
                let watcher = PolicyFileWatcher::spawn(Arc::clone(reloader), &path, DEFAULT_DEBOUNCE_MS)?;
                tracing::info!("Watching {} for policy changes", path.display());
                Some(watcher)
            }
            _ => None,
        };

        Ok((poller, watcher))
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

/// Port the webhook listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 8443;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
