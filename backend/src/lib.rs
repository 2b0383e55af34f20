//! Chat Relay Backend Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
/// Conversation storage
///
/// Owners, conversations and messages behind the `ChatStore` gateway.
pub mod chat;
pub mod config;
pub mod error;
pub mod relay;
pub mod upstream;
