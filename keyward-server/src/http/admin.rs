//! Health and policy administration handlers

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use keyward_core::{ReloadFailure, ReloadOutcome};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Whether a policy source is configured
    pub authorization_enabled: bool,
    /// Rules in the active policy
    pub rules: usize,
    /// Successful policy publishes so far
    pub generation: u64,
    /// Most recent failed reload, cleared by the next success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reload_failure: Option<ReloadFailureInfo>,
}

/// A failed reload as reported by the health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadFailureInfo {
    pub message: String,
    /// RFC 3339 timestamp
    pub at: String,
}

impl From<ReloadFailure> for ReloadFailureInfo {
    fn from(failure: ReloadFailure) -> Self {
        Self {
            message: failure.message,
            at: failure.at.to_rfc3339(),
        }
    }
}

/// GET /healthz - Server status and active policy summary
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (rules, generation) = state
        .authorizer
        .store()
        .map(|store| (store.rule_count(), store.generation()))
        .unwrap_or_default();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        authorization_enabled: state.authorizer.is_enabled(),
        rules,
        generation,
        last_reload_failure: state
            .reloader
            .as_ref()
            .and_then(|reloader| reloader.last_failure())
            .map(ReloadFailureInfo::from),
    })
}

/// Response for a successful POST /reload
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// Rules in the active policy after the reload
    pub rules: usize,
    /// Whether a new rule set was published
    pub changed: bool,
    pub generation: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminErrorResponse {
    /// Error message
    pub error: String,
}

/// POST /reload - Fetch and load the policy now
pub async fn reload(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(reloader) = &state.reloader else {
        return (
            StatusCode::NOT_FOUND,
            Json(AdminErrorResponse {
                error: "authorization disabled: no policy source configured".to_string(),
            }),
        )
            .into_response();
    };

    tracing::info!("Policy reload requested");
    match reloader.reload().await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ReloadResponse {
                rules: outcome.rule_count(),
                changed: matches!(outcome, ReloadOutcome::Swapped { .. }),
                generation: reloader.store().generation(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(AdminErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
