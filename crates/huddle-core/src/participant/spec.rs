//! Participant descriptor parsing: `name` or `name[arg1,arg2,...]`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::{HuddleError, Result};

const SPEC_PATTERN: &str = r"^([^\[\]]+)(?:\[([^\]]+)\])?$";

fn spec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SPEC_PATTERN).expect("participant spec pattern is valid"))
}

/// A parsed participant descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl ParticipantSpec {
    /// Parse a descriptor. Arguments are comma-separated and trimmed.
    ///
    /// Returns [`HuddleError::Parse`] naming the input when it does not match
    /// the grammar (unbalanced or empty brackets, trailing text).
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        let caps = spec_regex()
            .captures(trimmed)
            .ok_or_else(|| HuddleError::Parse {
                spec: spec.to_string(),
            })?;

        let name = caps[1].trim();
        if name.is_empty() {
            return Err(HuddleError::Parse {
                spec: spec.to_string(),
            });
        }

        let args = caps
            .get(2)
            .map(|m| m.as_str().split(',').map(|a| a.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }
}

impl std::str::FromStr for ParticipantSpec {
    type Err = HuddleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ParticipantSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.args.join(","))
        }
    }
}
