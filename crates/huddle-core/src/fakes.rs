//! In-memory fakes for huddle traits (testing only)
//!
//! Deterministic workers, selection models and memory sinks that satisfy the
//! trait contracts without any model backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{MemoryMetadata, MemorySink};
use crate::domain::error::BoxError;
use crate::domain::message::Message;
use crate::participant::{ChatWorker, Response, WorkerRequest};
use crate::selector::{SelectionModel, SelectionRequest};

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Always answers with the same text. Counts invocations.
#[derive(Debug)]
pub struct StaticWorker {
    reply: String,
    calls: AtomicUsize,
}

impl StaticWorker {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatWorker for StaticWorker {
    async fn respond(&self, request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Response::new(Message::text(request.agent, self.reply.clone())))
    }
}

/// Always fails with the given message.
#[derive(Debug)]
pub struct FailingWorker {
    error: String,
}

impl FailingWorker {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl ChatWorker for FailingWorker {
    async fn respond(&self, _request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        Err(self.error.clone().into())
    }
}

/// Panics when asked to speak.
#[derive(Debug, Default)]
pub struct PanickingWorker;

#[async_trait]
impl ChatWorker for PanickingWorker {
    async fn respond(&self, _request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        panic!("worker exploded");
    }
}

/// Never finishes its turn. Counts turns started and turns dropped
/// unfinished.
#[derive(Debug, Default)]
pub struct PendingWorker {
    started: AtomicUsize,
    abandoned: Arc<AtomicUsize>,
}

impl PendingWorker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }
}

/// Increments its counter when dropped.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatWorker for PendingWorker {
    async fn respond(&self, _request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        let _guard = DropCounter(Arc::clone(&self.abandoned));
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// Replies normally, then fires `token`. Simulates an interrupt arriving
/// between two turns.
#[derive(Debug)]
pub struct CancellingWorker {
    reply: String,
    token: CancellationToken,
}

impl CancellingWorker {
    pub fn new(reply: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            reply: reply.into(),
            token,
        }
    }
}

#[async_trait]
impl ChatWorker for CancellingWorker {
    async fn respond(&self, request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        self.token.cancel();
        Ok(Response::new(Message::text(request.agent, self.reply.clone())))
    }
}

// ---------------------------------------------------------------------------
// ScriptedSelectionModel
// ---------------------------------------------------------------------------

/// Returns queued outputs in order and records every request.
#[derive(Debug, Default)]
pub struct ScriptedSelectionModel {
    outputs: Mutex<VecDeque<String>>,
    failure: Option<String>,
    requests: Mutex<Vec<SelectionRequest>>,
}

impl ScriptedSelectionModel {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// A model whose every call fails.
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            failure: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<SelectionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SelectionModel for ScriptedSelectionModel {
    async fn select(&self, request: &SelectionRequest) -> Result<String, BoxError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = &self.failure {
            return Err(error.clone().into());
        }
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "selection script exhausted".into())
    }
}

/// A selection model that never answers. Counts calls.
#[derive(Debug, Default)]
pub struct PendingSelectionModel {
    calls: AtomicUsize,
}

impl PendingSelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelectionModel for PendingSelectionModel {
    async fn select(&self, _request: &SelectionRequest) -> Result<String, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

// ---------------------------------------------------------------------------
// RecordingMemorySink
// ---------------------------------------------------------------------------

/// Keeps every ingested transcript in memory.
#[derive(Debug, Default)]
pub struct RecordingMemorySink {
    writes: Mutex<Vec<(String, MemoryMetadata)>>,
    failure: Option<String>,
}

impl RecordingMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every write.
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            failure: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(String, MemoryMetadata)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemorySink for RecordingMemorySink {
    async fn ingest(&self, text: &str, metadata: &MemoryMetadata) -> Result<(), BoxError> {
        if let Some(error) = &self.failure {
            return Err(error.clone().into());
        }
        self.writes
            .lock()
            .unwrap()
            .push((text.to_string(), metadata.clone()));
        Ok(())
    }
}
