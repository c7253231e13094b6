//! Events emitted on a conversation stream.

use serde::{Deserialize, Serialize};

use crate::domain::message::Message;
use crate::domain::state::TaskResult;

/// One item of a [`ConversationStream`](super::ConversationStream).
///
/// Every stream ends with exactly one `Final` while a consumer is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConversationEvent {
    SpeakerSelected { turn: u32, name: String },
    Message(Message),
    Final(TaskResult),
}

impl ConversationEvent {
    pub fn is_final(&self) -> bool {
        matches!(self, ConversationEvent::Final(_))
    }

    /// Message view of a non-final event. Speaker selections become
    /// `selection_event` messages sourced from `team`.
    pub fn into_message(self, team: &str) -> Option<Message> {
        match self {
            ConversationEvent::SpeakerSelected { name, .. } => Some(Message::selection(team, name)),
            ConversationEvent::Message(message) => Some(message),
            ConversationEvent::Final(_) => None,
        }
    }
}
