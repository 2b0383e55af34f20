//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use std::time::Duration;

/// Default generation service endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000/api/v1/chat/stream";

/// Owner id used when `OWNER_ID` is unset
pub const DEFAULT_OWNER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Persistence configuration
    pub persistence: PersistenceConfig,
    /// Generation service configuration
    pub upstream: UpstreamConfig,
    /// Identity every request runs as
    pub owner: OwnerConfig,
    /// Relay behavior
    pub relay: RelayConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// SQLite database file
    pub database_path: String,
}

/// Generation service configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Full URL of the streaming generation endpoint
    pub url: String,
    /// Deadline for the response headers; `None` waits indefinitely
    pub response_timeout: Option<Duration>,
}

/// Owner configuration
#[derive(Debug, Clone)]
pub struct OwnerConfig {
    /// Owner id
    pub id: String,
    /// Owner email
    pub email: String,
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum characters in a conversation title
    pub title_max_chars: usize,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            persistence: PersistenceConfig {
                database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| {
                    // Default to ~/.chat-relay or current directory
                    if let Some(home) = env::var_os("HOME") {
                        format!("{}/.chat-relay/chat.db", home.to_string_lossy())
                    } else {
                        ".chat-relay/chat.db".to_string()
                    }
                }),
            },
            upstream: UpstreamConfig {
                url: env::var("UPSTREAM_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string()),
                response_timeout: env::var("UPSTREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .map(Duration::from_secs),
            },
            owner: OwnerConfig {
                id: env::var("OWNER_ID").unwrap_or_else(|_| DEFAULT_OWNER_ID.to_string()),
                email: env::var("OWNER_EMAIL").unwrap_or_else(|_| "guest@localhost".to_string()),
            },
            relay: RelayConfig {
                title_max_chars: env::var("TITLE_MAX_CHARS")
                    .ok()
                    .and_then(|n| n.parse().ok())
                    .filter(|n: &usize| *n > 3)
                    .unwrap_or(50),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
