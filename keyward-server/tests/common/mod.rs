//! Shared test utilities for keyward-server integration tests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use keyward_server::{AppState, KeywardServer, ServerConfig};
use serde_json::json;
use tokio::net::TcpListener;

/// Token the fake Keystone accepts
pub const VALID_TOKEN: &str = "gAAAAABalice";

/// GET /v3/auth/tokens on a minimal Keystone stand-in
async fn validate_token(headers: HeaderMap) -> impl IntoResponse {
    let subject = headers
        .get("X-Subject-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if subject != VALID_TOKEN {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "message": "Could not find token"}})),
        )
            .into_response();
    }

    Json(json!({
        "token": {
            "methods": ["password"],
            "expires_at": "2099-01-01T00:00:00.000000Z",
            "user": {"id": "u-1", "name": "alice", "domain": {"id": "default", "name": "Default"}},
            "project": {"id": "p-1", "name": "demo", "domain": {"id": "default", "name": "Default"}},
            "roles": [{"id": "r-1", "name": "member"}]
        }
    }))
    .into_response()
}

/// GET /v3 version document
async fn identity_version() -> impl IntoResponse {
    Json(json!({
        "version": {
            "id": "v3.14",
            "status": "stable",
            "links": [{"rel": "self", "href": "http://localhost/v3/"}]
        }
    }))
}

/// Starts a fake Keystone, returns its base URL
#[allow(dead_code)]
pub async fn spawn_fake_keystone() -> String {
    let router = Router::new()
        .route("/v3", get(identity_version))
        .route("/v3/auth/tokens", get(validate_token));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    format!("http://{addr}")
}

/// Spawns the webhook server on an ephemeral port
#[allow(dead_code)]
pub async fn spawn_server(server: KeywardServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run_with_listener(listener).await;
    });

    // Brief delay to ensure server is accepting connections
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    addr
}

/// Spawns a server with the given state
#[allow(dead_code)]
pub async fn spawn_with_state(state: Arc<AppState>) -> SocketAddr {
    spawn_server(KeywardServer::with_state(ServerConfig::default(), state)).await
}
