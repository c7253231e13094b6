//! Participants: anything that can take a turn in a conversation.
//!
//! # Module layout
//!
//! - [`spec`]: `ParticipantSpec` descriptor parsing
//! - [`registry`]: `ParticipantRegistry`, kind name → factory
//! - [`leaf`]: `LeafAgent`, `ChatWorker`, `ToolSpec`
//! - [`team`]: `SubTeam`, a nested team acting as one participant
//! - [`user_proxy`]: console-backed human participant

pub mod leaf;
pub mod registry;
pub mod spec;
pub mod team;
pub mod user_proxy;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::checkpoint::MemorySink;
use crate::domain::error::BoxError;
use crate::domain::message::Message;

pub use leaf::{ChatWorker, LeafAgent, ToolSpec, WorkerRequest};
pub use registry::ParticipantRegistry;
pub use spec::ParticipantSpec;
pub use team::SubTeam;
pub use user_proxy::{ConsoleInput, InputSource, UserProxy, USER_PROXY_NAME};

/// What a participant receives when it is asked to speak.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub task: &'a str,
    pub history: &'a [Message],
    /// Cancellation signal of the running conversation.
    pub cancel: &'a CancellationToken,
}

/// One turn's output: intermediate events followed by the final message.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Tool requests/results produced before the final message, in order.
    pub inner_messages: Vec<Message>,
    pub chat_message: Message,
}

impl Response {
    pub fn new(chat_message: Message) -> Self {
        Self {
            inner_messages: Vec::new(),
            chat_message,
        }
    }

    pub fn with_inner(mut self, inner_messages: Vec<Message>) -> Self {
        self.inner_messages = inner_messages;
        self
    }
}

/// A conversation participant.
#[derive(Debug, Clone)]
pub enum Participant {
    Leaf(LeafAgent),
    SubTeam(SubTeam),
}

impl Participant {
    pub fn name(&self) -> &str {
        match self {
            Participant::Leaf(agent) => agent.name(),
            Participant::SubTeam(team) => team.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Participant::Leaf(agent) => agent.description(),
            Participant::SubTeam(team) => team.description(),
        }
    }

    /// Produce this participant's contribution to the current turn.
    pub async fn respond(&self, ctx: &TurnContext<'_>) -> Result<Response, BoxError> {
        match self {
            Participant::Leaf(agent) => agent.respond(ctx).await,
            Participant::SubTeam(team) => Box::pin(team.respond(ctx)).await,
        }
    }

    /// Durable ingestion capability, if this participant has one.
    pub fn memory_sink(&self) -> Option<Arc<dyn MemorySink>> {
        match self {
            Participant::Leaf(agent) => agent.memory().cloned(),
            Participant::SubTeam(_) => None,
        }
    }
}

impl From<LeafAgent> for Participant {
    fn from(agent: LeafAgent) -> Self {
        Participant::Leaf(agent)
    }
}

impl From<SubTeam> for Participant {
    fn from(team: SubTeam) -> Self {
        Participant::SubTeam(team)
    }
}
