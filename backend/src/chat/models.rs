//! Chat data models
//!
//! Defines structures for owners, conversations and messages.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Current time as Unix milliseconds, the resolution used for every stored timestamp
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user
    User,
    /// Message from the assistant/AI
    Assistant,
}

impl MessageRole {
    /// Convert the role to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }
}

/// Who can see a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owner
    #[default]
    Private,
    /// Anyone with the link
    Public,
}

impl Visibility {
    /// Convert the visibility to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }
}

impl From<&str> for Visibility {
    fn from(s: &str) -> Self {
        match s {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

/// The identity that owns conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Stable owner identifier
    pub id: String,
    /// Contact address stored alongside the owner row
    pub email: String,
}

/// A conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    /// Unique identifier, supplied by the client
    pub id: String,
    /// Owning identity
    pub owner_id: String,
    /// Title of the conversation (derived from the first message, upstream, or user-set)
    pub title: String,
    /// Stored as "private" or "public"
    pub visibility: String,
    /// When the conversation was created (Unix millis)
    pub created_at: i64,
    /// When the conversation was last updated (Unix millis)
    pub updated_at: i64,
}

impl Conversation {
    /// Create a new private conversation
    pub fn new(id: String, owner_id: String, title: String) -> Self {
        let now = now_millis();
        Self {
            id,
            owner_id,
            title,
            visibility: Visibility::Private.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the visibility as enum
    pub fn visibility_enum(&self) -> Visibility {
        Visibility::from(self.visibility.as_str())
    }
}

/// One ordered content segment of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    /// Plain text
    Text {
        /// The text itself
        text: String,
    },
    /// Reference to an attached file
    File {
        /// Where the file can be fetched from
        url: String,
        /// Original file name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// MIME type reported by the client
        #[serde(default, rename = "mediaType", skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (client-supplied or server-generated)
    pub id: String,
    /// ID of the conversation this message belongs to
    pub conversation_id: String,
    /// Role of the message sender
    pub role: MessageRole,
    /// Ordered content segments
    pub parts: Vec<MessagePart>,
    /// When the message was created (Unix millis)
    pub created_at: i64,
}

impl Message {
    /// Create a new message from content segments
    pub fn new(
        id: String,
        conversation_id: String,
        role: MessageRole,
        parts: Vec<MessagePart>,
    ) -> Self {
        Self {
            id,
            conversation_id,
            role,
            parts,
            created_at: now_millis(),
        }
    }

    /// Create a message holding a single text segment
    pub fn text(id: String, conversation_id: String, role: MessageRole, text: String) -> Self {
        Self::new(id, conversation_id, role, vec![MessagePart::Text { text }])
    }

    /// Concatenation of all text segments
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::File { .. } => None,
            })
            .collect()
    }
}

/// Raw `messages` row; `parts` is the JSON-encoded segment list
#[derive(Debug, Clone, FromRow)]
pub(crate) struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub parts: String,
    pub created_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = serde_json::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            parts: serde_json::from_str(&row.parts)?,
            role: MessageRole::from(row.role.as_str()),
            id: row.id,
            conversation_id: row.conversation_id,
            created_at: row.created_at,
        })
    }
}

/// Where a page of the conversation history starts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageCursor {
    /// Most recent conversations first
    #[default]
    Latest,
    /// Conversations older than the one with this id
    StartingAfter(String),
    /// Conversations newer than the one with this id
    EndingBefore(String),
}

/// One page of the conversation history, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationPage {
    /// Conversations in this page
    pub conversations: Vec<Conversation>,
    /// Whether more conversations exist beyond this page in the cursor's direction
    pub has_more: bool,
}
