//! Authentication and authorization webhook handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use keyward_core::AuthenticationError;

use super::review::{
    SubjectAccessReview, SubjectAccessReviewStatus, TokenReview, TokenReviewStatus,
};
use crate::AppState;

/// POST /authenticate - Resolve a bearer token through Keystone
///
/// Failures are reported in the review status, never as HTTP errors, so the
/// API server treats them as "not authenticated" rather than webhook outages.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(review): Json<TokenReview>,
) -> Json<TokenReview> {
    let status = match state.resolver.resolve(&review.spec.token).await {
        Ok(identity) => {
            tracing::info!(user = %identity.user_name, project = %identity.project_name, "authenticated");
            TokenReviewStatus::authenticated(&identity)
        }
        Err(e) => {
            match &e {
                AuthenticationError::Unavailable(_) | AuthenticationError::InvalidResponse(_) => {
                    tracing::error!("Token review failed: {}", e)
                }
                AuthenticationError::MissingToken | AuthenticationError::InvalidToken => {
                    tracing::info!("Token rejected: {}", e)
                }
            }
            TokenReviewStatus::unauthenticated(e.to_string())
        }
    };

    Json(review.respond(status))
}

/// POST /authorize - Decide a SubjectAccessReview against the active policy
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Json(review): Json<SubjectAccessReview>,
) -> Json<SubjectAccessReview> {
    let identity = review.spec.identity();
    let authorization = match review.spec.action() {
        Ok(action) => state.authorizer.authorize(&identity, &action),
        Err(err) => state.authorizer.reject(&identity, &err),
    };

    Json(review.respond(SubjectAccessReviewStatus::from(&authorization)))
}
