//! Deterministic workers and selection for offline runs.
//!
//! Nothing here calls a model. The CLI builds whole teams from configuration
//! with these, which makes conversations reproducible end to end.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::error::BoxError;
use crate::domain::message::Message;
use crate::participant::{ChatWorker, Response, WorkerRequest};
use crate::selector::{SelectionModel, SelectionRequest};

/// Replies from a fixed script, one line per turn; the final line repeats.
///
/// `{task}` and `{last}` in a line are replaced by the conversation task and
/// the text of the latest message.
#[derive(Debug)]
pub struct ScriptedWorker {
    replies: Vec<String>,
    cursor: AtomicUsize,
}

impl ScriptedWorker {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    fn next_reply(&self) -> Option<&str> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.replies
            .get(index)
            .or_else(|| self.replies.last())
            .map(String::as_str)
    }
}

#[async_trait]
impl ChatWorker for ScriptedWorker {
    async fn respond(&self, request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        let template = self
            .next_reply()
            .ok_or_else(|| format!("{} has an empty script", request.agent))?;
        let last = request
            .history
            .last()
            .map(|m| m.text_content().into_owned())
            .unwrap_or_else(|| request.task.to_string());
        let text = template
            .replace("{task}", request.task)
            .replace("{last}", &last);
        Ok(Response::new(Message::text(request.agent, text)))
    }
}

/// Selects candidates in order, starting after the previous speaker.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobinModel;

#[async_trait]
impl SelectionModel for RoundRobinModel {
    async fn select(&self, request: &SelectionRequest) -> Result<String, BoxError> {
        let next = request
            .last_speaker
            .as_deref()
            .and_then(|last| request.candidates.iter().position(|c| c == last))
            .map_or(0, |i| (i + 1) % request.candidates.len());
        request
            .candidates
            .get(next)
            .cloned()
            .ok_or_else(|| "no candidates to rotate through".into())
    }
}
