//! Relay-specific error types
//!
//! Errors that abort a relay request before any response bytes are sent.
//! Everything after the stream starts is handled inside its branch.

use crate::upstream::UpstreamError;
use thiserror::Error;

/// Errors returned by [`RelayController::handle_request`](crate::relay::RelayController::handle_request)
#[derive(Error, Debug)]
pub enum RelayError {
    /// The inbound request breaks a precondition
    #[error("Invalid relay request: {0}")]
    InvalidRequest(String),

    /// The generation service could not be reached or refused the request
    #[error("Generation service failed: {0}")]
    Upstream(#[from] UpstreamError),
}
