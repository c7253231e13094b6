//! Orchestrator configuration.
//!
//! Built once (usually from TOML) and passed by reference to the
//! [`Orchestrator`](crate::orchestrator::Orchestrator). Nothing reads it
//! through global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checkpoint::DEFAULT_MEMORY_SINK;
use crate::coordinator::{TeamConfig, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_TURNS};
use crate::domain::error::{HuddleError, Result};
use crate::participant::spec::ParticipantSpec;
use crate::participant::USER_PROXY_NAME;
use crate::termination::{TerminationCondition, BYE_TOKEN, TERMINATE_TOKEN};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Participant descriptors, `kind` or `kind[arg, ...]`.
    pub participants: Vec<String>,

    /// Append a console-backed `user_proxy` and end on its `BYE`.
    #[serde(default)]
    pub enable_user_proxy: bool,

    #[serde(default)]
    pub first_speaker: Option<String>,

    /// Checkpoint target. An empty string disables checkpointing.
    #[serde(default = "default_memory_sink")]
    pub memory_sink: String,

    #[serde(default)]
    pub selector_prompt: Option<String>,

    /// Replaces the default termination token (`TERMINATE`, or `BYE` with
    /// the user proxy).
    #[serde(default)]
    pub termination_token: Option<String>,

    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_name() -> String {
    "orchestrator".to_string()
}

fn default_description() -> String {
    "Multi-agent orchestrator with model-driven speaker selection".to_string()
}

fn default_max_turns() -> u32 {
    DEFAULT_MAX_TURNS
}

fn default_memory_sink() -> String {
    DEFAULT_MEMORY_SINK.to_string()
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl OrchestratorConfig {
    /// Config with defaults for everything but the participant list.
    pub fn new<I, S>(participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: default_name(),
            description: default_description(),
            max_turns: default_max_turns(),
            participants: participants.into_iter().map(Into::into).collect(),
            enable_user_proxy: false,
            first_speaker: None,
            memory_sink: default_memory_sink(),
            selector_prompt: None,
            termination_token: None,
            event_buffer: default_event_buffer(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| HuddleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Static checks. Descriptors are parsed here so syntax errors surface
    /// before any run starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(HuddleError::Config("max_turns must be at least 1".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(HuddleError::Config(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        if self.participants.is_empty() && !self.enable_user_proxy {
            return Err(HuddleError::Config(
                "at least one participant is required".to_string(),
            ));
        }
        if let Some(token) = &self.termination_token {
            if token.trim().is_empty() {
                return Err(HuddleError::Config(
                    "termination_token must not be empty".to_string(),
                ));
            }
        }
        for spec in &self.participants {
            ParticipantSpec::parse(spec)?;
        }
        Ok(())
    }

    /// `BYE` from `user_proxy` when the proxy is enabled, otherwise
    /// `TERMINATE` from anyone.
    pub fn termination_conditions(&self) -> Vec<TerminationCondition> {
        if self.enable_user_proxy {
            let token = self.termination_token.as_deref().unwrap_or(BYE_TOKEN);
            vec![TerminationCondition::from_sources(token, [USER_PROXY_NAME])]
        } else {
            let token = self.termination_token.as_deref().unwrap_or(TERMINATE_TOKEN);
            vec![TerminationCondition::any_source(token)]
        }
    }

    pub fn team_config(&self) -> TeamConfig {
        TeamConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            max_turns: self.max_turns,
            termination: self.termination_conditions(),
            first_speaker: self.first_speaker.clone(),
            memory_sink: Some(self.memory_sink.clone()).filter(|s| !s.is_empty()),
            selector_prompt: self.selector_prompt.clone(),
            event_buffer: self.event_buffer,
        }
    }
}
