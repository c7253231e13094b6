//! Top-level entry point.
//!
//! An [`Orchestrator`] turns an [`OrchestratorConfig`] into a running
//! conversation: participants are resolved fresh for every run, the user proxy
//! is appended when enabled, and the termination policy is derived from the
//! config. Setup failures are returned before any event is produced.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::OrchestratorConfig;
use crate::coordinator::{ConversationStream, Team};
use crate::domain::error::Result;
use crate::domain::state::TaskResult;
use crate::participant::{ConsoleInput, InputSource, Participant, ParticipantRegistry, UserProxy};
use crate::selector::SelectionModel;

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<ParticipantRegistry>,
    model: Arc<dyn SelectionModel>,
    user_input: Option<Arc<dyn InputSource>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<ParticipantRegistry>,
        model: Arc<dyn SelectionModel>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            model,
            user_input: None,
        })
    }

    /// Input source for the user proxy. Defaults to stdin.
    pub fn with_user_input(mut self, input: Arc<dyn InputSource>) -> Self {
        self.user_input = Some(input);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Resolve the configured participants, plus the user proxy if enabled.
    pub async fn create_participants(&self) -> Result<Vec<Participant>> {
        let mut participants = self.registry.resolve_all(&self.config.participants).await?;

        if self.config.enable_user_proxy {
            let input: Arc<dyn InputSource> = match &self.user_input {
                Some(input) => Arc::clone(input),
                None => Arc::new(ConsoleInput::new()),
            };
            participants.push(UserProxy::participant(input));
            info!("added user proxy to participants");
        }

        info!(
            orchestrator = %self.config.name,
            count = participants.len(),
            "created participants"
        );
        Ok(participants)
    }

    /// Build a fresh team for one run.
    pub async fn build_team(&self) -> Result<Team> {
        let participants = self.create_participants().await?;
        Team::new(
            self.config.team_config(),
            participants,
            Arc::clone(&self.model),
        )
    }

    /// Start a conversation on `task`.
    #[instrument(skip_all, fields(orchestrator = %self.config.name))]
    pub async fn start(
        &self,
        task: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<ConversationStream> {
        let team = self.build_team().await?;
        let stream = team.run_stream_with_cancel(task, cancel);
        info!(conversation_id = %stream.conversation_id(), "conversation started");
        Ok(stream)
    }

    /// Run `task` to completion.
    pub async fn run(&self, task: impl Into<String>) -> Result<TaskResult> {
        self.start(task, CancellationToken::new())
            .await?
            .into_result()
            .await
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("user_input", &self.user_input.is_some())
            .finish()
    }
}
