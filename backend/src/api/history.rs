//! Conversation history endpoints
//!
//! Keyset-paginated listing of the owner's conversations and title rename.

use crate::api::conversations::owned_conversation;
use crate::api::state::AppState;
use crate::chat::{Conversation, PageCursor, Visibility};
use crate::error::AppError;
use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

/// Page size when `limit` is absent
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Largest page a client may request
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Query parameters of `GET /api/history`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Page size, clamped to 1..=100
    pub limit: Option<u32>,
    /// Return conversations older than this id
    pub starting_after: Option<String>,
    /// Return conversations newer than this id
    pub ending_before: Option<String>,
}

/// Conversation summary as listed in history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation id
    pub id: String,
    /// Current title
    pub title: String,
    /// Who can see the conversation
    pub visibility: Visibility,
    /// Creation time (Unix millis)
    pub created_at: i64,
    /// Last update (Unix millis)
    pub updated_at: i64,
}

impl From<Conversation> for ConversationSummary {
    fn from(c: Conversation) -> Self {
        let visibility = c.visibility_enum();
        Self {
            id: c.id,
            title: c.title,
            visibility,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Response of `GET /api/history`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    /// Conversations, newest first
    pub chats: Vec<ConversationSummary>,
    /// Whether another page exists in the requested direction
    pub has_more: bool,
}

/// Body of `POST /api/history/rename`
#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    /// Conversation id
    pub id: Option<String>,
    /// New title
    pub title: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /api/history - List the owner's conversations
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let cursor = match (non_blank(query.starting_after), non_blank(query.ending_before)) {
        (Some(_), Some(_)) => {
            return Err(AppError::InvalidRequest(
                "Only one of startingAfter or endingBefore can be provided".to_string(),
            ))
        }
        (Some(id), None) => PageCursor::StartingAfter(id),
        (None, Some(id)) => PageCursor::EndingBefore(id),
        (None, None) => PageCursor::Latest,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let owner = state.owners.resolve();
    let page = state
        .store
        .list_conversations(&owner.id, limit, &cursor)
        .await?;

    Ok(Json(HistoryResponse {
        chats: page.conversations.into_iter().map(Into::into).collect(),
        has_more: page.has_more,
    }))
}

/// POST /api/history/rename - Replace a conversation's title
pub async fn rename_conversation(
    State(state): State<AppState>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<ConversationSummary>, AppError> {
    let (Some(id), Some(title)) = (non_blank(request.id), non_blank(request.title)) else {
        return Err(AppError::InvalidRequest(
            "Both id and title are required".to_string(),
        ));
    };
    let title = title.trim();

    owned_conversation(&state, &id).await?;
    state.store.update_conversation_title(&id, title).await?;
    tracing::info!(conversation_id = %id, title = %title, "Conversation renamed");

    let conversation = state
        .store
        .get_conversation(&id)
        .await?
        .ok_or_else(|| AppError::ConversationNotFound(id.clone()))?;

    Ok(Json(conversation.into()))
}
