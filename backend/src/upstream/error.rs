//! Upstream-specific error types
//!
//! Errors that can occur while calling the generation service.

use thiserror::Error;

/// Errors raised by a generation client
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The HTTP request could not be sent or its body could not be read
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Start of the response body, for logs
        body: String,
    },

    /// The service answered successfully but sent no body
    #[error("Upstream returned an empty body")]
    EmptyBody,

    /// No response headers arrived within the configured deadline
    #[error("Upstream did not respond within {0} seconds")]
    Timeout(u64),
}
