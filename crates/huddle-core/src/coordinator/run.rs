//! The per-conversation loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::checkpoint::{self, CheckpointOutcome};
use crate::coordinator::event::ConversationEvent;
use crate::coordinator::TeamInner;
use crate::domain::error::SelectionError;
use crate::domain::message::Message;
use crate::domain::state::{ConversationState, FailureKind, RunFailure, RunStatus, TaskResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::participant::TurnContext;
use crate::selector::SelectionResult;
use crate::termination::first_match;

const MAX_TURNS_REASON: &str = "max turns reached";
const INTERRUPTED_REASON: &str = "User interruption";
const INTERRUPTED_NOTE: &str = "Task was interrupted by user.";
const SYSTEM_SOURCE: &str = "system";

/// How the turn loop ended.
enum Ending {
    Completed(String),
    Interrupted,
    Failed(RunFailure),
    /// The stream was dropped; nobody is left to tell.
    ConsumerGone,
}

struct Emitter {
    tx: mpsc::Sender<ConversationEvent>,
}

impl Emitter {
    /// Returns `false` once the consumer has gone away.
    async fn emit(&self, event: ConversationEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Resolves when the stream has been dropped.
    async fn consumer_gone(&self) {
        self.tx.closed().await
    }
}

pub(super) async fn drive(
    team: Arc<TeamInner>,
    conversation_id: Uuid,
    task: String,
    cancel: CancellationToken,
    tx: mpsc::Sender<ConversationEvent>,
) {
    let started = Instant::now();
    let id = conversation_id.to_string();
    let events = Emitter { tx };
    let mut state = ConversationState::new(task);

    obs::emit_conversation_started(&id, &team.config.name, team.participants.len());

    let ending = run_turns(&team, &mut state, &cancel, &events, &id).await;

    let (status, failure) = match ending {
        Ending::Completed(reason) => {
            state.stop_reason = Some(reason);
            if let Some(sink) = &team.config.memory_sink {
                let outcome =
                    checkpoint::checkpoint(&state, &team.participants, sink, conversation_id).await;
                debug!(?outcome, "checkpoint attempted");
                if let CheckpointOutcome::Failed(error) = &outcome {
                    warn!(sink = %sink, error = %error, "conversation completed without memory write");
                }
            }
            (RunStatus::Completed, None)
        }
        Ending::Interrupted => {
            let note = state.append(Message::text(SYSTEM_SOURCE, INTERRUPTED_NOTE)).clone();
            state.stop_reason = Some(INTERRUPTED_REASON.to_string());
            if !events.emit(ConversationEvent::Message(note)).await {
                debug!("consumer dropped before interruption note");
                return;
            }
            (RunStatus::Interrupted, None)
        }
        Ending::Failed(failure) => {
            warn!(%failure, "conversation failed");
            state.stop_reason = Some(failure.to_string());
            (RunStatus::Failed, Some(failure))
        }
        Ending::ConsumerGone => {
            debug!(turns = state.turn_count, "consumer dropped; stopping conversation");
            return;
        }
    };

    let stop_reason = state.stop_reason.take().unwrap_or_default();
    obs::emit_conversation_finished(
        &id,
        status,
        state.turn_count,
        started.elapsed().as_millis() as u64,
        &stop_reason,
    );

    let result = TaskResult {
        conversation_id,
        status,
        history: state.history,
        stop_reason,
        turn_count: state.turn_count,
        failure,
    };
    if !events.emit(ConversationEvent::Final(result)).await {
        debug!("consumer dropped before final event");
    }
}

async fn run_turns(
    team: &TeamInner,
    state: &mut ConversationState,
    cancel: &CancellationToken,
    events: &Emitter,
    id: &str,
) -> Ending {
    loop {
        if cancel.is_cancelled() {
            return Ending::Interrupted;
        }
        if state.turn_count >= team.config.max_turns {
            return Ending::Completed(MAX_TURNS_REASON.to_string());
        }

        let selected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ending::Interrupted,
            _ = events.consumer_gone() => return Ending::ConsumerGone,
            r = AssertUnwindSafe(
                team.selector.select_next(state, &team.participants, team.model.as_ref())
            ).catch_unwind() => r,
        };
        let speaker = match selected {
            Ok(Ok(SelectionResult::Speaker(name))) => name,
            Ok(Ok(SelectionResult::NoCandidate)) => {
                return Ending::Failed(selection_failure(&SelectionError::NoCandidate {
                    reason: "team has no participants".to_string(),
                }))
            }
            Ok(Err(e)) => return Ending::Failed(selection_failure(&e)),
            Err(panic) => {
                return Ending::Failed(RunFailure {
                    kind: FailureKind::Selection,
                    participant: None,
                    detail: panic_detail(panic),
                })
            }
        };

        let turn = state.turn_count + 1;
        obs::emit_speaker_selected(id, turn, &speaker);
        let selected = ConversationEvent::SpeakerSelected {
            turn,
            name: speaker.clone(),
        };
        if !events.emit(selected).await {
            return Ending::ConsumerGone;
        }

        let Some(participant) = team.participants.iter().find(|p| p.name() == speaker) else {
            return Ending::Failed(selection_failure(&SelectionError::NoCandidate {
                reason: format!("{speaker} is not a participant"),
            }));
        };

        let ctx = TurnContext {
            task: &state.task,
            history: &state.history,
            cancel,
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ending::Interrupted,
            _ = events.consumer_gone() => return Ending::ConsumerGone,
            r = AssertUnwindSafe(participant.respond(&ctx)).catch_unwind() => r,
        };
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Ending::Failed(invocation_failure(&speaker, e.to_string())),
            Err(panic) => return Ending::Failed(invocation_failure(&speaker, panic_detail(panic))),
        };

        let inner_count = response.inner_messages.len();
        for message in response.inner_messages {
            let stored = state.append(message).clone();
            if !events.emit(ConversationEvent::Message(stored)).await {
                return Ending::ConsumerGone;
            }
        }
        let last = state.append(response.chat_message).clone();
        state.turn_count += 1;
        METRICS.inc_turns();
        obs::emit_turn_completed(id, state.turn_count, &speaker, inner_count);

        let matched = first_match(&team.config.termination, &last).map(|c| c.description());
        if !events.emit(ConversationEvent::Message(last)).await {
            return Ending::ConsumerGone;
        }
        if let Some(reason) = matched {
            return Ending::Completed(reason);
        }
    }
}

fn selection_failure(error: &SelectionError) -> RunFailure {
    RunFailure {
        kind: FailureKind::Selection,
        participant: None,
        detail: error.to_string(),
    }
}

fn invocation_failure(speaker: &str, detail: String) -> RunFailure {
    RunFailure {
        kind: FailureKind::ParticipantInvocation,
        participant: Some(speaker.to_string()),
        detail,
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("panicked: {message}")
}
