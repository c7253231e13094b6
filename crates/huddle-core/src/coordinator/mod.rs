//! Conversation loop and streaming coordinator.
//!
//! A [`Team`] is an immutable set of participants plus the policy that drives
//! them: who may speak first, how the next speaker is chosen, when to stop and
//! where to checkpoint. Each `run_stream*` call spawns an independent loop on
//! the tokio runtime and hands back a [`ConversationStream`].

pub mod event;
mod run;
pub mod stream;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::checkpoint::DEFAULT_MEMORY_SINK;
use crate::domain::error::{HuddleError, Result};
use crate::domain::state::TaskResult;
use crate::obs;
use crate::participant::Participant;
use crate::selector::{SelectionModel, TurnSelector};
use crate::termination::{TerminationCondition, TERMINATE_TOKEN};

pub use event::ConversationEvent;
pub use stream::ConversationStream;

/// Default turn budget.
pub const DEFAULT_MAX_TURNS: u32 = 50;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 32;

/// Policy of a [`Team`].
#[derive(Debug, Clone, PartialEq)]
pub struct TeamConfig {
    pub name: String,
    pub description: String,
    pub max_turns: u32,
    /// Checked in order against each turn's final message.
    pub termination: Vec<TerminationCondition>,
    pub first_speaker: Option<String>,
    /// Participant that receives the transcript on completion. `None`
    /// disables checkpointing.
    pub memory_sink: Option<String>,
    pub selector_prompt: Option<String>,
    pub event_buffer: usize,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            name: "group_chat".to_string(),
            description: "A group of agents working on a task together".to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            termination: vec![TerminationCondition::any_source(TERMINATE_TOKEN)],
            first_speaker: None,
            memory_sink: Some(DEFAULT_MEMORY_SINK.to_string()),
            selector_prompt: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

struct TeamInner {
    config: TeamConfig,
    participants: Vec<Participant>,
    selector: TurnSelector,
    model: Arc<dyn SelectionModel>,
}

/// A set of participants coordinated by a selection model.
///
/// Cheap to clone; clones share the same participants.
#[derive(Clone)]
pub struct Team {
    inner: Arc<TeamInner>,
}

impl Team {
    /// Build a team. Participant names must be unique.
    pub fn new(
        config: TeamConfig,
        participants: Vec<Participant>,
        model: Arc<dyn SelectionModel>,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(participants.len());
        if let Some(dup) = participants.iter().find(|p| !seen.insert(p.name())) {
            return Err(HuddleError::Config(format!(
                "duplicate participant name {:?} in team {}",
                dup.name(),
                config.name
            )));
        }
        if config.event_buffer == 0 {
            return Err(HuddleError::Config(
                "event_buffer must be at least 1".to_string(),
            ));
        }

        let mut selector = TurnSelector::new();
        if let Some(prompt) = &config.selector_prompt {
            selector = selector.with_prompt(prompt.clone());
        }
        if let Some(first) = &config.first_speaker {
            selector = selector.with_first_speaker(first.clone());
        }

        Ok(Self {
            inner: Arc::new(TeamInner {
                config,
                participants,
                selector,
                model,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn description(&self) -> &str {
        &self.inner.config.description
    }

    pub fn config(&self) -> &TeamConfig {
        &self.inner.config
    }

    pub fn participants(&self) -> &[Participant] {
        &self.inner.participants
    }

    /// Start a conversation that can only end on its own.
    pub fn run_stream(&self, task: impl Into<String>) -> ConversationStream {
        self.run_stream_with_cancel(task, CancellationToken::new())
    }

    /// Start a conversation that stops as `Interrupted` once `cancel` fires.
    ///
    /// Must be called within a tokio runtime.
    pub fn run_stream_with_cancel(
        &self,
        task: impl Into<String>,
        cancel: CancellationToken,
    ) -> ConversationStream {
        let conversation_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.config.event_buffer);
        let span = obs::conversation_span(&conversation_id.to_string(), self.name());

        tokio::spawn(
            run::drive(
                Arc::clone(&self.inner),
                conversation_id,
                task.into(),
                cancel,
                tx,
            )
            .instrument(span),
        );

        ConversationStream::new(conversation_id, rx)
    }

    /// Run to completion and return the final result.
    pub async fn run(&self, task: impl Into<String>) -> Result<TaskResult> {
        self.run_stream(task).into_result().await
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.inner.participants.iter().map(Participant::name).collect();
        f.debug_struct("Team")
            .field("config", &self.inner.config)
            .field("participants", &names)
            .finish()
    }
}
