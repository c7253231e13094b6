//! Post-run memory checkpoint.
//!
//! After a conversation completes normally the transcript is handed to the
//! designated memory-sink participant. Memory is best-effort: a missing sink or
//! a failed ingest is logged and reported, never propagated.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::BoxError;
use crate::domain::message::render_transcript;
use crate::domain::state::ConversationState;
use crate::metrics::METRICS;
use crate::obs;
use crate::participant::Participant;

/// Default name of the memory-sink participant.
pub const DEFAULT_MEMORY_SINK: &str = "interaction_memory";

const SUMMARY_HEADER: &str = "Conversation summary:";

/// Metadata handed to the sink alongside the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub source: String,
    pub stop_reason: String,
    pub conversation_id: Uuid,
}

/// Durable ingestion capability of a memory participant.
#[async_trait]
pub trait MemorySink: Send + Sync {
    async fn ingest(&self, text: &str, metadata: &MemoryMetadata) -> Result<(), BoxError>;
}

/// What happened when a checkpoint was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Written,
    /// No participant with the sink name, or it has no ingestion capability.
    SinkMissing,
    /// Nothing to write.
    EmptyHistory,
    /// The sink rejected the write.
    Failed(String),
}

/// Render the text block handed to the sink.
pub fn render_summary(state: &ConversationState) -> String {
    format!("{SUMMARY_HEADER}\n{}", render_transcript(&state.history))
}

/// Write the transcript of a completed conversation to the memory sink.
#[instrument(skip(state, participants))]
pub async fn checkpoint(
    state: &ConversationState,
    participants: &[Participant],
    sink_name: &str,
    conversation_id: Uuid,
) -> CheckpointOutcome {
    let Some(sink) = participants
        .iter()
        .find(|p| p.name() == sink_name)
        .and_then(Participant::memory_sink)
    else {
        warn!(sink = %sink_name, "no memory sink among participants; skipping checkpoint");
        return CheckpointOutcome::SinkMissing;
    };

    if state.history.is_empty() {
        info!("empty history; skipping checkpoint");
        return CheckpointOutcome::EmptyHistory;
    }

    let metadata = MemoryMetadata {
        source: "orchestrator".to_string(),
        stop_reason: state.stop_reason.clone().unwrap_or_default(),
        conversation_id,
    };

    match sink.ingest(&render_summary(state), &metadata).await {
        Ok(()) => {
            METRICS.inc_checkpoints();
            info!(sink = %sink_name, messages = state.history.len(), "conversation saved to memory");
            CheckpointOutcome::Written
        }
        Err(e) => {
            METRICS.inc_checkpoint_failures();
            obs::emit_checkpoint_failed(&conversation_id.to_string(), sink_name, &e);
            CheckpointOutcome::Failed(e.to_string())
        }
    }
}

/// One line of a [`JsonlMemorySink`] file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    pub mime_type: String,
    pub metadata: MemoryMetadata,
    pub stored_at: DateTime<Utc>,
}

/// Appends one JSON record per ingest to a file.
#[derive(Debug, Clone)]
pub struct JsonlMemorySink {
    path: PathBuf,
}

impl JsonlMemorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MemorySink for JsonlMemorySink {
    async fn ingest(&self, text: &str, metadata: &MemoryMetadata) -> Result<(), BoxError> {
        let record = MemoryRecord {
            content: text.to_string(),
            mime_type: "text/plain".to_string(),
            metadata: metadata.clone(),
            stored_at: Utc::now(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
