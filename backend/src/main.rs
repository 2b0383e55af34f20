//! Chat Relay Backend
//!
//! Relays chat conversations to a streaming generation service, streams the
//! answer back to the client as Server-Sent Events and records the exchange.

use axum::{extract::Request, middleware::Next, response::Response};
use chat_relay_backend::{
    api::{self, AppState},
    chat::{ChatDb, ChatStore, FixedOwnerResolver, OwnerResolver},
    config::Config,
    relay::RelayController,
    upstream::HttpGenerationClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    // For the relay endpoint this measures time to first byte, not the stream
    let duration = start.elapsed();
    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    let chat_db = ChatDb::new(&config.persistence.database_path).await?;
    info!(path = %config.persistence.database_path, "Chat database ready");
    let store: Arc<dyn ChatStore> = Arc::new(chat_db);

    let owners: Arc<dyn OwnerResolver> = Arc::new(FixedOwnerResolver::new(
        config.owner.id.clone(),
        config.owner.email.clone(),
    ));

    let upstream = HttpGenerationClient::new(
        reqwest::Client::new(),
        config.upstream.url.clone(),
        config.upstream.response_timeout,
    );
    info!(url = %config.upstream.url, "Generation service configured");

    let controller = RelayController::new(
        store.clone(),
        Arc::new(upstream),
        owners.clone(),
        config.relay.title_max_chars,
    );

    let app = api::router(AppState::new(controller, store, owners))
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive()); // Allow CORS for development

    // Bind to address from config
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Setup graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
