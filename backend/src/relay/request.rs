//! Inbound relay request
//!
//! The JSON body a client posts to start a generation, plus the conversions
//! to the stored message and the upstream call.

use crate::chat::{Message, MessagePart, MessageRole};
use crate::upstream::{GenerationRequest, UpstreamMessage};
use serde::Deserialize;
use uuid::Uuid;

/// A file the client attached to a message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Where the file can be fetched from
    pub url: String,
    /// Original file name
    #[serde(default)]
    pub name: Option<String>,
    /// MIME type
    #[serde(default)]
    pub content_type: Option<String>,
}

/// One message of the inbound conversation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Client-supplied id; retried saves with the same id never duplicate
    #[serde(default)]
    pub id: Option<String>,
    /// Sender role
    pub role: MessageRole,
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Attached files
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl InboundMessage {
    /// Convert into a stored message, generating an id when the client sent none
    pub fn to_record(&self, conversation_id: &str) -> Message {
        let id = self
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut parts = Vec::with_capacity(1 + self.attachments.len());
        if !self.content.is_empty() {
            parts.push(MessagePart::Text {
                text: self.content.clone(),
            });
        }
        parts.extend(self.attachments.iter().map(|attachment| MessagePart::File {
            url: attachment.url.clone(),
            name: attachment.name.clone(),
            media_type: attachment.content_type.clone(),
        }));

        Message::new(id, conversation_id.to_string(), self.role, parts)
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Client-generated conversation id
    pub conversation_id: String,
    /// Full conversation, oldest first
    pub messages: Vec<InboundMessage>,
    /// Preferred model
    #[serde(default)]
    pub model_hint: Option<String>,
}

impl RelayRequest {
    /// First user message, the source of a new conversation's title
    pub fn first_user_message(&self) -> Option<&InboundMessage> {
        self.messages.iter().find(|m| m.role == MessageRole::User)
    }

    /// Most recent user message, the one persisted by this request
    pub fn latest_user_message(&self) -> Option<&InboundMessage> {
        self.messages.iter().rev().find(|m| m.role == MessageRole::User)
    }

    /// Whether any message carries an attachment
    pub fn has_document(&self) -> bool {
        self.messages.iter().any(|m| !m.attachments.is_empty())
    }

    /// Body for the upstream generation call
    pub fn to_generation_request(&self, owner_id: &str) -> GenerationRequest {
        GenerationRequest {
            messages: self
                .messages
                .iter()
                .map(|m| UpstreamMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            conversation_id: self.conversation_id.clone(),
            owner_id: owner_id.to_string(),
            model: self.model_hint.clone(),
            has_document: self.has_document(),
        }
    }
}
