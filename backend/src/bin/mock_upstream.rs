//! Mock generation service for local development
//!
//! Answers `POST /api/v1/chat/stream` with the tagged wire format, echoing the
//! last user message word by word after a title line.
//!
//! ```text
//! MOCK_UPSTREAM_PORT=8000 cargo run --bin mock-upstream
//! ```

use async_stream::stream;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
struct MockMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MockRequest {
    messages: Vec<MockMessage>,
    #[serde(default)]
    conversation_id: String,
}

fn wire_line(tag: &str, payload: &impl serde::Serialize) -> String {
    let json = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
    format!("{}:{}\n", tag, json)
}

async fn generate(Json(request): Json<MockRequest>) -> Response {
    let prompt = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.clone())
        .unwrap_or_default();

    info!(
        conversation_id = %request.conversation_id,
        prompt_len = prompt.len(),
        "Mock generation started"
    );

    let title: String = prompt.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
    let delay = Duration::from_millis(
        env::var("MOCK_UPSTREAM_DELAY_MS")
            .ok()
            .and_then(|d| d.parse().ok())
            .unwrap_or(50),
    );

    let body = stream! {
        yield Ok::<_, std::io::Error>(wire_line("f", &serde_json::json!({"messageId": "mock"})));
        if !title.is_empty() {
            yield Ok(wire_line("t", &title));
        }
        yield Ok(wire_line("0", &"You said: "));
        for word in prompt.split_inclusive(' ') {
            tokio::time::sleep(delay).await;
            yield Ok(wire_line("0", &word));
        }
        yield Ok(wire_line("e", &serde_json::json!({"finishReason": "stop"})));
        yield Ok(wire_line("d", &serde_json::json!({"finishReason": "stop"})));
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port: u16 = env::var("MOCK_UPSTREAM_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let app = Router::new().route("/api/v1/chat/stream", post(generate));

    info!("Mock generation service on http://{}/api/v1/chat/stream", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
