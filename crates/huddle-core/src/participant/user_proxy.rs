//! Human-in-the-loop participant.

use std::io::BufRead;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::domain::error::BoxError;
use crate::domain::message::Message;
use crate::participant::leaf::{ChatWorker, LeafAgent, WorkerRequest};
use crate::participant::{Participant, Response};
use crate::termination::BYE_TOKEN;

/// Name the user proxy always registers under.
pub const USER_PROXY_NAME: &str = "user_proxy";

const USER_PROXY_DESCRIPTION: &str = "A human user who can answer questions and end the session";

/// Source of human input. `Ok(None)` means the input is closed.
#[async_trait]
pub trait InputSource: Send + Sync {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>, BoxError>;
}

type LineReceiver = Arc<Mutex<mpsc::Receiver<std::io::Result<String>>>>;

/// Reads lines from a blocking reader, by default the process stdin.
///
/// The reader lives on its own OS thread and hands lines over a channel, so a
/// pending `read_line` can be dropped at any time and never holds up runtime
/// shutdown. All stdin-backed inputs share one reader thread.
pub struct ConsoleInput {
    lines: LineReceiver,
}

impl ConsoleInput {
    pub fn new() -> Self {
        static STDIN_LINES: OnceLock<LineReceiver> = OnceLock::new();
        let lines = STDIN_LINES
            .get_or_init(|| spawn_reader(std::io::BufReader::new(std::io::stdin())));
        Self {
            lines: Arc::clone(lines),
        }
    }

    /// Read from `reader` instead of stdin.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self {
            lines: spawn_reader(reader),
        }
    }
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward lines from `reader` until it ends, fails, or every receiver is gone.
fn spawn_reader<R>(reader: R) -> LineReceiver
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let spawned = std::thread::Builder::new()
        .name("huddle-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        });
    if let Err(error) = spawned {
        // The sender was dropped with the closure, so the input reads as closed.
        warn!(%error, "failed to start input reader thread");
    }
    Arc::new(Mutex::new(rx))
}

#[async_trait]
impl InputSource for ConsoleInput {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>, BoxError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        match self.lines.lock().await.recv().await {
            Some(line) => Ok(Some(line?)),
            None => Ok(None),
        }
    }
}

/// Worker that relays the conversation to a human and returns their answer.
///
/// Closed input is treated as the user saying goodbye.
pub struct UserProxy {
    input: Arc<dyn InputSource>,
}

impl UserProxy {
    pub fn new(input: Arc<dyn InputSource>) -> Self {
        Self { input }
    }

    /// Build the `user_proxy` participant around `input`.
    pub fn participant(input: Arc<dyn InputSource>) -> Participant {
        Participant::Leaf(LeafAgent::new(
            USER_PROXY_NAME,
            USER_PROXY_DESCRIPTION,
            Arc::new(Self::new(input)),
        ))
    }
}

#[async_trait]
impl ChatWorker for UserProxy {
    async fn respond(&self, request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        let answer = self
            .input
            .read_line("Enter your response: ")
            .await?
            .map(|line| line.trim().to_string())
            .unwrap_or_else(|| BYE_TOKEN.to_string());
        Ok(Response::new(Message::text(request.agent, answer)))
    }
}
