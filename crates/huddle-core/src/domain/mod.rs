//! Domain model: messages, conversation state, run outcomes and errors.

pub mod error;
pub mod message;
pub mod state;

pub use error::{BoxError, HuddleError, Result, SelectionError};
pub use message::{render_transcript, Message, MessageContent, MessageKind};
pub use state::{ConversationState, FailureKind, RunFailure, RunStatus, TaskResult};
