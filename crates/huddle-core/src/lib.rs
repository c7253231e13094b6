//! Huddle Core Library
//!
//! Model-driven group conversations: a set of participants takes turns on a
//! task, a selection model picks each speaker, and the run is streamed to the
//! caller as ordered events until a termination condition, the turn budget,
//! a failure or a cancellation ends it.

pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod participant;
pub mod scripted;
pub mod selector;
pub mod telemetry;
pub mod termination;

pub use checkpoint::{
    checkpoint, render_summary, CheckpointOutcome, JsonlMemorySink, MemoryMetadata, MemoryRecord,
    MemorySink, DEFAULT_MEMORY_SINK,
};
pub use config::OrchestratorConfig;
pub use coordinator::{
    ConversationEvent, ConversationStream, Team, TeamConfig, DEFAULT_EVENT_BUFFER,
    DEFAULT_MAX_TURNS,
};
pub use domain::{
    render_transcript, BoxError, ConversationState, FailureKind, HuddleError, Message,
    MessageContent, MessageKind, Result, RunFailure, RunStatus, SelectionError, TaskResult,
};
pub use orchestrator::Orchestrator;
pub use participant::{
    ChatWorker, ConsoleInput, InputSource, LeafAgent, Participant, ParticipantRegistry,
    ParticipantSpec, Response, SubTeam, ToolSpec, TurnContext, UserProxy, WorkerRequest,
    USER_PROXY_NAME,
};
pub use scripted::{RoundRobinModel, ScriptedWorker};
pub use selector::{
    SelectionModel, SelectionRequest, SelectionResult, TurnSelector, DEFAULT_SELECTOR_PROMPT,
};
pub use termination::{first_match, TerminationCondition, BYE_TOKEN, TERMINATE_TOKEN};

pub use metrics::METRICS;
pub use obs::{
    conversation_span, emit_checkpoint_failed, emit_conversation_finished,
    emit_conversation_started, emit_speaker_selected, emit_turn_completed,
};
pub use telemetry::init_tracing;

/// Huddle version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
