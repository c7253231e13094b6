//! Structured lifecycle events for conversations.
//!
//! Every event carries an `event` field (`conversation.started`,
//! `turn.completed`, ...) so log pipelines can filter on it without parsing
//! messages. Use `--json` on the CLI for newline-delimited output.

use tracing::{info, warn};

use crate::domain::state::RunStatus;

/// Span tagging everything logged inside one conversation with its id.
///
/// Attach it with `Instrument::instrument` so it follows the loop across
/// await points.
pub fn conversation_span(conversation_id: &str, team: &str) -> tracing::Span {
    tracing::info_span!("huddle.conversation", conversation_id = %conversation_id, team = %team)
}

pub fn emit_conversation_started(conversation_id: &str, team: &str, participants: usize) {
    info!(
        event = "conversation.started",
        conversation_id = %conversation_id,
        team = %team,
        participants = participants,
    );
}

pub fn emit_speaker_selected(conversation_id: &str, turn: u32, speaker: &str) {
    info!(
        event = "speaker.selected",
        conversation_id = %conversation_id,
        turn = turn,
        speaker = %speaker,
    );
}

pub fn emit_turn_completed(conversation_id: &str, turn: u32, speaker: &str, inner_messages: usize) {
    info!(
        event = "turn.completed",
        conversation_id = %conversation_id,
        turn = turn,
        speaker = %speaker,
        inner_messages = inner_messages,
    );
}

pub fn emit_conversation_finished(
    conversation_id: &str,
    status: RunStatus,
    turns: u32,
    duration_ms: u64,
    stop_reason: &str,
) {
    info!(
        event = "conversation.finished",
        conversation_id = %conversation_id,
        status = %status,
        turns = turns,
        duration_ms = duration_ms,
        stop_reason = %stop_reason,
    );
}

/// Memory write failed. Logged at warn; the run result is unaffected.
pub fn emit_checkpoint_failed(conversation_id: &str, sink: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "checkpoint.failed",
        conversation_id = %conversation_id,
        sink = %sink,
        error = %error,
    );
}
