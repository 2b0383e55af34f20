//! Stream event types
//!
//! `StreamEvent` is what the decoder produces and the encoder frames. The
//! payload types model the shapes the upstream service sends for each tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event of a generation stream, serialized as a client frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A generation step begins
    StartStep,
    /// A text part with this id begins
    TextStart {
        /// Text part id
        id: String,
    },
    /// A piece of text for an open text part
    TextDelta {
        /// Text part id
        id: String,
        /// Text to append
        delta: String,
    },
    /// The text part with this id is complete
    TextEnd {
        /// Text part id
        id: String,
    },
    /// The model called a tool
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        /// Correlates call and result
        tool_call_id: String,
        /// Name of the tool
        tool_name: String,
        /// Arguments as sent by the model
        input: Value,
    },
    /// A tool returned its result
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        /// Correlates call and result
        tool_call_id: String,
        /// Tool output
        output: Value,
    },
    /// The upstream service suggested a conversation title
    #[serde(rename = "data-title")]
    Title {
        /// Title payload
        data: TitleData,
    },
    /// The upstream service reported an error inside the stream
    #[serde(rename_all = "camelCase")]
    Error {
        /// Human readable error
        error_text: String,
    },
    /// The current generation step is complete
    FinishStep,
    /// Terminal event: the stream has ended
    Finish,
}

impl StreamEvent {
    /// Build a title event
    pub fn title(title: impl Into<String>) -> Self {
        StreamEvent::Title {
            data: TitleData {
                title: title.into(),
            },
        }
    }

    /// Whether this is the terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finish)
    }
}

/// Body of a title event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleData {
    /// Suggested title
    pub title: String,
}

/// Payload of a text line: a string, an object with `content`, or a list of blocks
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextPayload {
    /// `"Hello"`
    Plain(String),
    /// `[{"type":"text","text":"Hel"}, "lo"]`
    Blocks(Vec<ContentBlock>),
    /// `{"content": ...}` where content is any of these shapes
    Wrapped {
        /// Nested payload
        content: Box<TextPayload>,
    },
    /// Anything else (null, numbers, unrelated objects)
    Other(Value),
}

impl TextPayload {
    /// Normalize into the delta string; unknown shapes yield an empty string
    pub fn into_text(self) -> String {
        match self {
            TextPayload::Plain(text) => text,
            TextPayload::Blocks(blocks) => blocks.into_iter().filter_map(ContentBlock::into_text).collect(),
            TextPayload::Wrapped { content } => content.into_text(),
            TextPayload::Other(_) => String::new(),
        }
    }
}

/// One element of a block-list text payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    /// `"text"`
    Plain(String),
    /// `{"text": "..."}`, usually with `"type": "text"`
    Text {
        /// Block text
        text: String,
    },
    /// Non-text block (images, tool references)
    Other(Value),
}

impl ContentBlock {
    fn into_text(self) -> Option<String> {
        match self {
            ContentBlock::Plain(text) | ContentBlock::Text { text } => Some(text),
            ContentBlock::Other(_) => None,
        }
    }
}

/// Payload of a title line: `"Title"` or `{"title": "Title"}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TitlePayload {
    /// Bare string
    Plain(String),
    /// Object form
    Object {
        /// The title
        title: String,
    },
    /// Unusable payload
    Other(Value),
}

impl TitlePayload {
    /// Trimmed title, or `None` when absent or blank
    pub fn into_title(self) -> Option<String> {
        let title = match self {
            TitlePayload::Plain(title) | TitlePayload::Object { title } => title,
            TitlePayload::Other(_) => return None,
        };
        let trimmed = title.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Payload of a tool-call line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    /// Correlates call and result
    pub tool_call_id: String,
    /// Name of the tool
    pub tool_name: String,
    /// Arguments
    #[serde(default)]
    pub args: Value,
}

/// Payload of a tool-result line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    /// Correlates call and result
    pub tool_call_id: String,
    /// Tool output
    #[serde(default)]
    pub result: Value,
}
