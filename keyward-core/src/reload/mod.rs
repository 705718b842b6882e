//! Policy reloading
//!
//! [`PolicyReloader`] is the only writer of a [`PolicyStore`]. Each reload
//! fetches the full policy text, loads it, and publishes the result with a
//! single swap. Any failure leaves the last-known-good rule set in place and is
//! recorded for the health endpoint.

mod watcher;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::policy::{self, PolicyParseError};
use crate::source::{PolicySource, SourceError};
use crate::store::PolicyStore;

pub use watcher::{DEFAULT_DEBOUNCE_MS, PolicyFileWatcher};

/// A reload did not produce a new rule set
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Parse(#[from] PolicyParseError),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// The most recent failed reload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadFailure {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Result of a successful reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new rule set was published
    Swapped { rules: usize, generation: u64 },
    /// The fetched policy equals the active one; nothing was published
    Unchanged { rules: usize },
}

impl ReloadOutcome {
    pub fn rule_count(&self) -> usize {
        match self {
            Self::Swapped { rules, .. } | Self::Unchanged { rules } => *rules,
        }
    }
}

/// Fetches, loads and publishes policy from one source
pub struct PolicyReloader {
    source: Arc<dyn PolicySource>,
    store: Arc<PolicyStore>,
    fetch_timeout: Duration,
    last_failure: ArcSwapOption<ReloadFailure>,
    // Serializes reloads so polling, file events and manual triggers never interleave
    in_flight: Mutex<()>,
}

impl PolicyReloader {
    pub fn new(source: Arc<dyn PolicySource>, store: Arc<PolicyStore>) -> Self {
        Self {
            source,
            store,
            fetch_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            last_failure: ArcSwapOption::empty(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Create a reloader over a fresh store and perform the initial load
    ///
    /// A failed initial load is not fatal: the store stays empty, so every
    /// request is refused until a later reload succeeds.
    pub async fn bootstrap(source: Arc<dyn PolicySource>, fetch_timeout: Duration) -> Self {
        let reloader = Self::new(source, Arc::new(PolicyStore::empty())).with_fetch_timeout(fetch_timeout);
        if reloader.reload().await.is_err() {
            tracing::warn!(
                source = %reloader.source.describe(),
                "initial policy load failed; refusing all requests until a reload succeeds"
            );
        }
        reloader
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn PolicySource> {
        &self.source
    }

    /// The last failure, cleared by the next successful reload
    pub fn last_failure(&self) -> Option<ReloadFailure> {
        self.last_failure.load_full().map(|failure| (*failure).clone())
    }

    /// Fetch and load the policy, swapping it in on success
    pub async fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let _guard = self.in_flight.lock().await;

        match self.try_reload().await {
            Ok(outcome) => {
                self.last_failure.store(None);
                match outcome {
                    ReloadOutcome::Swapped { rules, generation } => tracing::info!(
                        source = %self.source.describe(),
                        rules,
                        generation,
                        "policy loaded"
                    ),
                    ReloadOutcome::Unchanged { rules } => tracing::debug!(
                        source = %self.source.describe(),
                        rules,
                        "policy unchanged"
                    ),
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    source = %self.source.describe(),
                    error = %e,
                    "policy reload failed; keeping current policy"
                );
                self.last_failure.store(Some(Arc::new(ReloadFailure {
                    message: e.to_string(),
                    at: Utc::now(),
                })));
                Err(e)
            }
        }
    }

    async fn try_reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let text = tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .map_err(|_| SourceError::Timeout(self.fetch_timeout))??;
        let rules = policy::load(&text)?;
        let count = rules.len();

        if self.store.generation() > 0 && *self.store.current() == rules {
            return Ok(ReloadOutcome::Unchanged { rules: count });
        }

        match rules.to_json_pretty() {
            Ok(json) => tracing::debug!(policy = %json, "loaded policy"),
            Err(e) => tracing::debug!(error = %e, "could not render loaded policy"),
        }

        self.store.swap(rules);
        Ok(ReloadOutcome::Swapped {
            rules: count,
            generation: self.store.generation(),
        })
    }

    /// Reload every `interval` until the returned task is aborted
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let reloader = Arc::clone(self);
        tracing::info!(?interval, source = %reloader.source.describe(), "polling policy source");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Failures are logged and recorded by reload()
                let _ = reloader.reload().await;
            }
        })
    }
}
