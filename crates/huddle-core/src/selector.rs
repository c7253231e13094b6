//! Model-driven speaker selection.
//!
//! Each turn the selector builds a prompt from the role manifest, the rendered
//! history and the candidate names, asks the selection model once, and accepts
//! the answer only if it names a candidate exactly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::error::{BoxError, SelectionError};
use crate::domain::state::ConversationState;
use crate::metrics::METRICS;
use crate::participant::Participant;

/// Default selector prompt. `{roles}`, `{history}` and `{participants}` are
/// substituted before the model call.
pub const DEFAULT_SELECTOR_PROMPT: &str = "You are in a role play game. The following roles are available:
{roles}.
Read the following conversation. Then select the next role from {participants} to play. Only return the role.

{history}

Read the above conversation. Then select the next role from {participants} to play. Only return the role.";

/// Input of a single selection-model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    /// Fully rendered prompt.
    pub prompt: String,
    /// One `name: description` line per active participant.
    pub roles: String,
    /// `speaker: content` lines, starting with the task.
    pub history: String,
    pub candidates: Vec<String>,
    pub last_speaker: Option<String>,
}

/// Model that names the next speaker.
#[async_trait]
pub trait SelectionModel: Send + Sync {
    async fn select(&self, request: &SelectionRequest) -> Result<String, BoxError>;
}

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionResult {
    Speaker(String),
    NoCandidate,
}

/// Chooses the next speaker for a conversation.
#[derive(Debug, Clone)]
pub struct TurnSelector {
    prompt_template: String,
    first_speaker: Option<String>,
}

impl Default for TurnSelector {
    fn default() -> Self {
        Self {
            prompt_template: DEFAULT_SELECTOR_PROMPT.to_string(),
            first_speaker: None,
        }
    }
}

impl TurnSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// Force `name` to speak on the first turn, bypassing the model.
    pub fn with_first_speaker(mut self, name: impl Into<String>) -> Self {
        self.first_speaker = Some(name.into());
        self
    }

    pub fn first_speaker(&self) -> Option<&str> {
        self.first_speaker.as_deref()
    }

    /// Build the model request for the current state.
    pub fn build_request(
        &self,
        state: &ConversationState,
        participants: &[Participant],
    ) -> SelectionRequest {
        let roles = participants
            .iter()
            .map(|p| format!("{}: {}", p.name(), p.description()))
            .collect::<Vec<_>>()
            .join("\n");

        let mut lines = Vec::with_capacity(state.history.len() + 1);
        lines.push(format!("user: {}", state.task));
        lines.extend(
            state
                .history
                .iter()
                .map(|m| format!("{}: {}", m.source, m.content)),
        );
        let history = lines.join("\n");

        let candidates: Vec<String> = participants.iter().map(|p| p.name().to_string()).collect();

        let prompt = self
            .prompt_template
            .replace("{roles}", &roles)
            .replace("{participants}", &format!("[{}]", candidates.join(", ")))
            .replace("{history}", &history);

        SelectionRequest {
            prompt,
            roles,
            history,
            candidates,
            last_speaker: state.last_speaker().map(str::to_string),
        }
    }

    /// Pick the next speaker.
    ///
    /// The model is called at most once; its trimmed output must equal a
    /// candidate name exactly. A first-speaker override applies only while no
    /// turn has completed and must name an active participant.
    #[instrument(skip_all, fields(turn = state.turn_count + 1))]
    pub async fn select_next(
        &self,
        state: &ConversationState,
        participants: &[Participant],
        model: &dyn SelectionModel,
    ) -> Result<SelectionResult, SelectionError> {
        if participants.is_empty() {
            return Ok(SelectionResult::NoCandidate);
        }

        if state.turn_count == 0 {
            if let Some(first) = &self.first_speaker {
                if participants.iter().any(|p| p.name() == first) {
                    debug!(speaker = %first, "first speaker override");
                    return Ok(SelectionResult::Speaker(first.clone()));
                }
                return Err(SelectionError::FirstSpeakerUnavailable {
                    name: first.clone(),
                });
            }
        }

        if let [only] = participants {
            return Ok(SelectionResult::Speaker(only.name().to_string()));
        }

        let request = self.build_request(state, participants);
        METRICS.inc_model_selections();
        let raw = model.select(&request).await.map_err(SelectionError::Model)?;
        let choice = raw.trim();

        if request.candidates.iter().any(|c| c == choice) {
            Ok(SelectionResult::Speaker(choice.to_string()))
        } else {
            warn!(output = %raw, "selection model named no candidate");
            Err(SelectionError::InvalidCandidate {
                output: raw,
                candidates: request.candidates,
            })
        }
    }
}
