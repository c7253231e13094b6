//! Error taxonomy for huddle conversations.

/// Boxed error produced by external collaborators (workers, models, sinks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the turn selector.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("no valid candidate: {reason}")]
    NoCandidate { reason: String },

    #[error("selection model returned {output:?}, expected one of {candidates:?}")]
    InvalidCandidate {
        output: String,
        candidates: Vec<String>,
    },

    #[error("first speaker {name} is not an active participant")]
    FirstSpeakerUnavailable { name: String },

    #[error("selection model call failed: {0}")]
    Model(#[source] BoxError),
}

/// Huddle domain errors.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error("invalid participant specification: {spec:?}")]
    Parse { spec: String },

    #[error("unresolved participant: {name}")]
    UnresolvedParticipant { name: String },

    #[error("failed to create participant {name}: {source}")]
    ParticipantFactory {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("participant {name} failed: {source}")]
    ParticipantInvocation {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("conversation stream closed before the final event")]
    StreamClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for huddle operations.
pub type Result<T> = std::result::Result<T, HuddleError>;
