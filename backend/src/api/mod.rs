//! API module
//!
//! HTTP handlers and the router that mounts them

pub mod conversations;
pub mod history;
pub mod relay;
pub mod state;

pub use state::AppState;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    message: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Chat relay is healthy".to_string(),
    })
}

/// Build the application routes
///
/// Middleware is layered on by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chat", post(relay::relay_chat))
        .route(
            "/api/chat/:id",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route("/api/history", get(history::list_history))
        .route("/api/history/rename", post(history::rename_conversation))
        .with_state(state)
}
