//! Streaming relay
//!
//! Turns the upstream generation stream into client frames while a second
//! branch of the same stream is accumulated and persisted.

pub mod accumulator;
pub mod controller;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod events;
pub mod request;
pub mod splitter;
pub mod title;

pub use controller::{BackgroundOutcome, ClientBody, RelayController, RelayHandle};
pub use encoder::ClientOutcome;
pub use error::RelayError;
pub use events::StreamEvent;
pub use request::{Attachment, InboundMessage, RelayRequest};
