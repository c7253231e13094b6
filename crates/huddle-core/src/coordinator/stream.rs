//! Consumer side of a running conversation.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::coordinator::event::ConversationEvent;
use crate::domain::error::{HuddleError, Result};
use crate::domain::state::TaskResult;

/// Ordered, single-pass stream of [`ConversationEvent`]s.
///
/// Backed by a bounded channel: the loop suspends while the consumer lags.
/// Dropping the stream stops the loop at its next emission.
pub struct ConversationStream {
    conversation_id: Uuid,
    inner: ReceiverStream<ConversationEvent>,
}

impl ConversationStream {
    pub(crate) fn new(conversation_id: Uuid, rx: mpsc::Receiver<ConversationEvent>) -> Self {
        Self {
            conversation_id,
            inner: ReceiverStream::new(rx),
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Drain the stream and return the final result.
    pub async fn into_result(mut self) -> Result<TaskResult> {
        while let Some(event) = self.next().await {
            if let ConversationEvent::Final(result) = event {
                return Ok(result);
            }
        }
        Err(HuddleError::StreamClosed)
    }
}

impl Stream for ConversationStream {
    type Item = ConversationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for ConversationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStream")
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}
