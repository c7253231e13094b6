//! Conversation state and run outcome types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::message::Message;

/// Coordinator state machine: `Idle → Running → {Completed, Interrupted, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Interrupted | RunStatus::Failed
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Mutable state of one conversation, owned by its loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub task: String,
    pub history: Vec<Message>,
    pub turn_count: u32,
    pub stop_reason: Option<String>,
}

impl ConversationState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            history: Vec::new(),
            turn_count: 0,
            stop_reason: None,
        }
    }

    /// Append a message, stamping its ordinal. Returns the stored copy.
    pub fn append(&mut self, mut message: Message) -> &Message {
        message.seq = self.history.len() as u64 + 1;
        self.history.push(message);
        &self.history[self.history.len() - 1]
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.history.last()
    }

    /// Source of the most recent message, if any.
    pub fn last_speaker(&self) -> Option<&str> {
        self.history.last().map(|m| m.source.as_str())
    }
}

/// Category of a run-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Selection,
    ParticipantInvocation,
}

/// Structured failure detail carried by a failed run's final event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    /// Participant involved, when the failure is attributable to one.
    pub participant: Option<String>,
    pub detail: String,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.participant) {
            (FailureKind::Selection, _) => write!(f, "selection failed: {}", self.detail),
            (FailureKind::ParticipantInvocation, Some(name)) => {
                write!(f, "participant {name} failed: {}", self.detail)
            }
            (FailureKind::ParticipantInvocation, None) => {
                write!(f, "participant failed: {}", self.detail)
            }
        }
    }
}

/// Summary carried by the terminal `Final` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub conversation_id: Uuid,
    pub status: RunStatus,
    pub history: Vec<Message>,
    pub stop_reason: String,
    pub turn_count: u32,
    pub failure: Option<RunFailure>,
}

impl TaskResult {
    pub fn last_message(&self) -> Option<&Message> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_insertion_ordinals() {
        let mut state = ConversationState::new("task");
        state.append(Message::text("a", "one"));
        state.append(Message::text("b", "two"));
        let seqs: Vec<u64> = state.history.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(state.last_speaker(), Some("b"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Idle.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Interrupted.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_run_failure_display_names_participant() {
        let failure = RunFailure {
            kind: FailureKind::ParticipantInvocation,
            participant: Some("git".to_string()),
            detail: "timeout".to_string(),
        };
        assert_eq!(failure.to_string(), "participant git failed: timeout");
    }
}
