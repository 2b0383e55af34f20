//! Error types and error handling for the HTTP surface
//!
//! `AppError` wraps the subsystem errors and renders them as HTTP responses.
//! CRUD endpoints answer with a JSON body `{ "error", "status" }`. Relay
//! failures answer in plain text and never echo upstream internals.

use crate::chat::StoreError;
use crate::relay::RelayError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Body sent to the client when the generation service fails
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to generate a response";

/// Application-level error types
///
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Relay request failed before streaming started
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Error raised by the chat store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Conversation with the given ID was not found
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Request body or query failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Relay(RelayError::InvalidRequest(message)) => {
                return (StatusCode::BAD_REQUEST, message.clone()).into_response();
            }
            AppError::Relay(RelayError::Upstream(_)) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_FAILURE_MESSAGE).into_response();
            }
            AppError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Store(e) => {
                tracing::error!(error = %e, "Store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Store operation failed".to_string(),
                )
            }
            AppError::ConversationNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamError;
    use axum::body::to_bytes;

    async fn render(error: AppError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_upstream_failure_hides_details() {
        let error = AppError::from(RelayError::Upstream(UpstreamError::Status {
            status: 502,
            body: "Traceback: secret".to_string(),
        }));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, UPSTREAM_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_invalid_relay_request_is_plain_text() {
        let error = AppError::from(RelayError::InvalidRequest("messages cannot be empty".to_string()));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "messages cannot be empty");
    }

    #[tokio::test]
    async fn test_crud_errors_are_json() {
        let (status, body) = render(AppError::ConversationNotFound("c1".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["error"], "Conversation not found: c1");

        let (status, _) = render(AppError::Store(StoreError::NotFound("c2".to_string()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = render(AppError::InvalidRequest("bad".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("\"status\":400"));
    }
}
