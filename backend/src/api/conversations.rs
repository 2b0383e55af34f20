//! Conversation detail endpoints

use crate::api::history::ConversationSummary;
use crate::api::state::AppState;
use crate::chat::{Conversation, Message, MessagePart, MessageRole};
use crate::error::AppError;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;

/// Message response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// Message id
    pub id: String,
    /// Sender role
    pub role: MessageRole,
    /// Content segments
    pub parts: Vec<MessagePart>,
    /// Creation time (Unix millis)
    pub created_at: i64,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role,
            parts: m.parts,
            created_at: m.created_at,
        }
    }
}

/// Conversation with messages response
#[derive(Debug, Serialize)]
pub struct ConversationWithMessagesResponse {
    /// The conversation
    pub conversation: ConversationSummary,
    /// Messages in creation order
    pub messages: Vec<MessageResponse>,
}

/// The conversation, if it exists and belongs to the resolved owner
pub(crate) async fn owned_conversation(state: &AppState, id: &str) -> Result<Conversation, AppError> {
    let owner = state.owners.resolve();
    state
        .store
        .get_conversation(id)
        .await?
        .filter(|c| c.owner_id == owner.id)
        .ok_or_else(|| AppError::ConversationNotFound(id.to_string()))
}

/// GET /api/chat/:id - Get conversation with messages
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationWithMessagesResponse>, AppError> {
    let conversation = owned_conversation(&state, &id).await?;
    let messages = state.store.get_messages(&id).await?;

    Ok(Json(ConversationWithMessagesResponse {
        conversation: conversation.into(),
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

/// DELETE /api/chat/:id - Delete a conversation and its messages
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    owned_conversation(&state, &id).await?;
    state.store.delete_conversation(&id).await?;
    tracing::info!(conversation_id = %id, "Conversation deleted");

    Ok(Json(serde_json::json!({
        "message": "Conversation deleted successfully",
        "id": id
    })))
}
