//! Termination conditions, evaluated against the most recent message only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::message::Message;

/// Token conventionally emitted by autonomous participants to end a session.
pub const TERMINATE_TOKEN: &str = "TERMINATE";

/// Token a human-facing participant uses to end an interactive session.
pub const BYE_TOKEN: &str = "BYE";

/// A single-message stop predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminationCondition {
    /// Content contains `token`, whoever sent it.
    TextMatchAnySource { token: String },
    /// Content contains `token` and the sender is one of `sources`.
    TextMatchFromSource {
        token: String,
        sources: BTreeSet<String>,
    },
}

impl TerminationCondition {
    pub fn any_source(token: impl Into<String>) -> Self {
        TerminationCondition::TextMatchAnySource {
            token: token.into(),
        }
    }

    pub fn from_sources<I, S>(token: impl Into<String>, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TerminationCondition::TextMatchFromSource {
            token: token.into(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            TerminationCondition::TextMatchAnySource { token }
            | TerminationCondition::TextMatchFromSource { token, .. } => token,
        }
    }

    /// Case-sensitive substring match, restricted by source when configured.
    pub fn evaluate(&self, message: &Message) -> bool {
        match self {
            TerminationCondition::TextMatchAnySource { token } => {
                message.text_content().contains(token.as_str())
            }
            TerminationCondition::TextMatchFromSource { token, sources } => {
                sources.contains(&message.source) && message.text_content().contains(token.as_str())
            }
        }
    }

    /// Human-readable stop reason used when this condition fires.
    pub fn description(&self) -> String {
        match self {
            TerminationCondition::TextMatchAnySource { token } => {
                format!("Text '{token}' mentioned")
            }
            TerminationCondition::TextMatchFromSource { token, sources } => {
                let names: Vec<&str> = sources.iter().map(String::as_str).collect();
                format!("Text '{token}' mentioned by {}", names.join(", "))
            }
        }
    }
}

/// First condition in `conditions` that fires on `message`.
pub fn first_match<'a>(
    conditions: &'a [TerminationCondition],
    message: &Message,
) -> Option<&'a TerminationCondition> {
    conditions.iter().find(|c| c.evaluate(message))
}
