//! HTTP server module

mod admin;
pub mod review;
mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use admin::{AdminErrorResponse, HealthResponse, ReloadFailureInfo, ReloadResponse};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/authenticate", post(webhook::authenticate))
        .route("/authorize", post(webhook::authorize))
        .route("/healthz", get(admin::health))
        .route("/reload", post(admin::reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
