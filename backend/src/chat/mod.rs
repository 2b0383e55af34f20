//! Chat module
//!
//! Conversations, messages and their owners, plus the storage they live in.

pub mod db;
pub mod models;
pub mod owner;
pub mod store;

pub use db::ChatDb;
pub use models::{
    Conversation, ConversationPage, Message, MessagePart, MessageRole, Owner, PageCursor, Visibility,
};
pub use owner::{FixedOwnerResolver, OwnerResolver};
pub use store::{ChatStore, StoreError};
