//! Persistence gateway
//!
//! The operations the relay and the history endpoints need from storage.
//! `ChatDb` is the SQLite implementation; tests substitute their own.

use crate::chat::models::{Conversation, ConversationPage, Message, Owner, PageCursor};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a chat store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying database rejected the operation
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored message content could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while preparing the database
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Storage for owners, conversations and messages
///
/// `get_message_by_id` followed by `save_messages` for an unknown id must not
/// produce a duplicate under a single writer; implementations should also
/// ignore ids that already exist.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert the owner if it is not stored yet
    async fn ensure_owner_exists(&self, owner: &Owner) -> Result<(), StoreError>;

    /// Look up a conversation by id
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Create a conversation; the id is supplied by the caller
    ///
    /// Returns `false` when a conversation with that id already existed and
    /// nothing was written.
    async fn create_conversation(&self, conversation: &Conversation) -> Result<bool, StoreError>;

    /// Look up a message by id
    async fn get_message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError>;

    /// Store messages, skipping ids that already exist
    async fn save_messages(&self, messages: &[Message]) -> Result<(), StoreError>;

    /// Replace a conversation's title. Fails with `NotFound` for unknown ids.
    async fn update_conversation_title(&self, id: &str, title: &str) -> Result<(), StoreError>;

    /// All messages of a conversation in creation order
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    /// A page of the owner's conversations, newest first
    async fn list_conversations(
        &self,
        owner_id: &str,
        limit: u32,
        cursor: &PageCursor,
    ) -> Result<ConversationPage, StoreError>;

    /// Delete a conversation and its messages. Fails with `NotFound` for unknown ids.
    async fn delete_conversation(&self, id: &str) -> Result<(), StoreError>;
}
