//! keyward-core - Policy-based authorization for Keystone-backed Kubernetes webhooks
//!
//! Policy text flows from a [`PolicySource`] through the [`policy`] loader
//! into a [`PolicyStore`]. The [`Authorizer`] reads the store's current
//! snapshot and asks the [`DecisionEngine`] whether a Keystone [`Identity`]
//! may perform an [`Action`].

pub mod authorizer;
pub mod config;
pub mod engine;
pub mod keystone;
pub mod policy;
pub mod reload;
pub mod request;
pub mod source;
pub mod store;

use thiserror::Error;

pub use authorizer::{Authorization, Authorizer, DISABLED_REASON};
pub use config::{ConfigError, PolicySourceConfig, ServiceConfig, ServiceSettings};
pub use engine::{Decision, DecisionEngine, Fallback, Verdict};
pub use keystone::{AuthenticationError, IdentityResolver, KeystoneClient, KeystoneConfig};
pub use policy::{
    Effect, InvalidRuleError, Matcher, PolicyParseError, PolicyRule, RuleRecord, RuleSet, Verb,
};
pub use reload::{PolicyFileWatcher, PolicyReloader, ReloadError, ReloadFailure, ReloadOutcome};
pub use request::{Action, Identity, MalformedRequestError};
pub use source::{FilePolicySource, PolicySource, SourceError};
pub use store::PolicyStore;

/// Any error surfaced by this crate
#[derive(Debug, Error)]
pub enum KeywardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyParseError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Reload(#[from] ReloadError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    MalformedRequest(#[from] MalformedRequestError),
}

pub type Result<T> = std::result::Result<T, KeywardError>;
