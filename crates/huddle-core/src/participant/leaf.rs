//! Single-worker participants.
//!
//! A [`LeafAgent`] wraps one inference-capable [`ChatWorker`]. The worker is an
//! external collaborator: it produces a [`Response`] from the conversation so
//! far and the tools bound to the agent. Tool execution happens inside the
//! worker; the coordinator only relays the resulting messages.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::checkpoint::MemorySink;
use crate::domain::error::BoxError;
use crate::domain::message::Message;
use crate::participant::{Response, TurnContext};

/// Description of a tool bound to a leaf agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Everything a worker sees when asked to speak.
#[derive(Debug, Clone, Copy)]
pub struct WorkerRequest<'a> {
    /// Name of the agent the worker speaks for.
    pub agent: &'a str,
    pub task: &'a str,
    pub history: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// "Produce a response given conversation history and available tools."
#[async_trait]
pub trait ChatWorker: Send + Sync {
    async fn respond(&self, request: WorkerRequest<'_>) -> Result<Response, BoxError>;
}

/// A participant backed by a single worker.
#[derive(Clone)]
pub struct LeafAgent {
    name: String,
    description: String,
    worker: Arc<dyn ChatWorker>,
    tools: Vec<ToolSpec>,
    memory: Option<Arc<dyn MemorySink>>,
}

impl LeafAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        worker: Arc<dyn ChatWorker>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            worker,
            tools: Vec::new(),
            memory: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Attach a memory sink, making this agent eligible as a checkpoint target.
    pub fn with_memory(mut self, memory: Arc<dyn MemorySink>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn memory(&self) -> Option<&Arc<dyn MemorySink>> {
        self.memory.as_ref()
    }

    /// Ask the worker for a response. Every produced message is attributed to
    /// this agent.
    pub async fn respond(&self, ctx: &TurnContext<'_>) -> Result<Response, BoxError> {
        let request = WorkerRequest {
            agent: &self.name,
            task: ctx.task,
            history: ctx.history,
            tools: &self.tools,
        };
        let mut response = self.worker.respond(request).await?;
        for inner in &mut response.inner_messages {
            inner.source.clone_from(&self.name);
        }
        response.chat_message.source.clone_from(&self.name);
        Ok(response)
    }
}

impl std::fmt::Debug for LeafAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tools", &self.tools.len())
            .field("memory", &self.memory.is_some())
            .finish()
    }
}
