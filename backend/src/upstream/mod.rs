//! Upstream generation service
//!
//! The relay's only outbound dependency: a service that turns a message list
//! into a tagged wire stream.

pub mod client;
pub mod error;

pub use client::{ByteStream, GenerationClient, GenerationRequest, HttpGenerationClient, UpstreamMessage};
pub use error::UpstreamError;
