//! Server error types

use keyward_core::{ConfigError, ReloadError, SourceError};
use thiserror::Error;

/// Errors that stop the webhook server from starting or serving
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid service configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The policy source could not be opened
    #[error("policy source: {0}")]
    Source(#[from] SourceError),

    /// Reload triggers could not be started
    #[error("policy reloading: {0}")]
    Reload(#[from] ReloadError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
