//! Conversation messages.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a message represents within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    ToolRequest,
    ToolResult,
    SelectionEvent,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::ToolRequest => "tool_request",
            MessageKind::ToolResult => "tool_result",
            MessageKind::SelectionEvent => "selection_event",
        };
        write!(f, "{s}")
    }
}

/// Message payload: plain text or structured JSON (tool calls, tool results).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    Structured(serde_json::Value),
}

impl MessageContent {
    /// Text view of the content. Structured content renders as compact JSON.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            MessageContent::Text(s) => Cow::Borrowed(s),
            MessageContent::Structured(v) => Cow::Owned(v.to_string()),
        }
    }
}

impl std::fmt::Display for MessageContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

/// A single entry of the conversation history.
///
/// `seq` is the timestamp ordinal: it is `0` until the message is appended to
/// a [`ConversationState`](crate::domain::state::ConversationState), which
/// assigns 1-based insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub source: String,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(source: impl Into<String>, content: MessageContent, kind: MessageKind) -> Self {
        Self {
            source: source.into(),
            content,
            kind,
            seq: 0,
            created_at: Utc::now(),
        }
    }

    pub fn text(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(source, MessageContent::Text(content.into()), MessageKind::Text)
    }

    pub fn tool_request(source: impl Into<String>, calls: serde_json::Value) -> Self {
        Self::new(
            source,
            MessageContent::Structured(calls),
            MessageKind::ToolRequest,
        )
    }

    pub fn tool_result(source: impl Into<String>, results: serde_json::Value) -> Self {
        Self::new(
            source,
            MessageContent::Structured(results),
            MessageKind::ToolResult,
        )
    }

    /// Record of a speaker selection, attributed to the selecting team.
    pub fn selection(team: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self::new(
            team,
            MessageContent::Text(speaker.into()),
            MessageKind::SelectionEvent,
        )
    }

    /// Text view of the content.
    pub fn text_content(&self) -> Cow<'_, str> {
        self.content.as_text()
    }
}

/// Render messages as `source: content` lines, in order.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.source, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
