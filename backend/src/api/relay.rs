//! Relay endpoint
//!
//! `POST /api/chat` streams the generation back as Server-Sent Events while
//! the response is persisted in the background.

use crate::api::state::AppState;
use crate::error::AppError;
use crate::relay::{RelayHandle, RelayRequest};
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};

/// Header announcing the UI message stream protocol version
pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

/// POST /api/chat - Relay a conversation to the generation service
///
/// # Returns
/// * `Ok(Response)` - SSE stream of UI message events
/// * `Err(AppError)` - 400 for an invalid request, 500 if the generation service failed
pub async fn relay_chat(
    State(state): State<AppState>,
    Json(request): Json<RelayRequest>,
) -> Result<Response, AppError> {
    let RelayHandle { body, .. } = state.controller.handle_request(request).await?;
    // Dropping the join handles detaches both branches; the background branch
    // outlives this response.

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .header(UI_MESSAGE_STREAM_HEADER, "v1")
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build SSE response: {}", e)))
}
