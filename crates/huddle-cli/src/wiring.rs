//! `huddle.toml` loading and participant registry wiring.
//!
//! The CLI has no model backend. Agents are scripted ([`ScriptedWorker`]),
//! sub-teams are assembled from those agents, and speakers rotate through
//! [`RoundRobinModel`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use huddle_core::{
    BoxError, JsonlMemorySink, LeafAgent, OrchestratorConfig, Participant, ParticipantRegistry,
    RoundRobinModel, ScriptedWorker, SubTeam, Team, TeamConfig, TerminationCondition,
    DEFAULT_MEMORY_SINK, TERMINATE_TOKEN,
};

/// Contents of `huddle.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    pub orchestrator: OrchestratorConfig,

    /// Scripted agents, keyed by participant kind.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentProfile>,

    /// Sub-teams built from agents, keyed by participant kind.
    #[serde(default)]
    pub teams: BTreeMap<String, TeamProfile>,

    #[serde(default)]
    pub memory: MemoryProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentProfile {
    pub description: String,
    /// One line per turn; the last one repeats. `{args}` expands to the
    /// descriptor arguments.
    pub replies: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamProfile {
    pub description: String,
    /// Agent descriptors, as in `orchestrator.participants`. `{args}` in a
    /// member or in the description expands to the team's descriptor
    /// arguments.
    pub members: Vec<String>,
    #[serde(default = "default_team_turns")]
    pub max_turns: u32,
    #[serde(default)]
    pub termination_token: Option<String>,
    #[serde(default)]
    pub first_speaker: Option<String>,
}

fn default_team_turns() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryProfile {
    /// JSONL file receiving conversation summaries.
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self {
            path: default_memory_path(),
        }
    }
}

fn default_memory_path() -> PathBuf {
    PathBuf::from(".huddle/interaction_memory.jsonl")
}

impl CliConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("Failed to parse huddle config")?;
        config
            .orchestrator
            .validate()
            .context("Invalid [orchestrator] section")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Registry with every configured agent and team, plus the
    /// `interaction_memory` sink unless an agent already claims that kind.
    pub fn build_registry(&self) -> ParticipantRegistry {
        let mut agents = ParticipantRegistry::new();
        for (kind, profile) in &self.agents {
            register_agent(&mut agents, kind, profile.clone());
        }
        if !agents.contains(DEFAULT_MEMORY_SINK) {
            register_memory(&mut agents, self.memory.path.clone());
        }

        let members = Arc::new(agents.clone());
        let mut registry = agents;
        for (kind, profile) in &self.teams {
            register_team(&mut registry, kind, profile.clone(), Arc::clone(&members));
        }
        registry
    }

    /// Descriptor kinds referenced by the config that nothing provides.
    pub fn missing_kinds(&self, registry: &ParticipantRegistry) -> Vec<String> {
        let mut specs: Vec<&str> = self
            .orchestrator
            .participants
            .iter()
            .map(String::as_str)
            .collect();
        for team in self.teams.values() {
            specs.extend(team.members.iter().map(String::as_str));
        }

        let mut missing: Vec<String> = specs
            .into_iter()
            .filter_map(|s| huddle_core::ParticipantSpec::parse(s).ok())
            .map(|s| s.name)
            .filter(|kind| !registry.contains(kind))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

fn register_agent(registry: &mut ParticipantRegistry, kind: &str, profile: AgentProfile) {
    let name = kind.to_string();
    registry.register(kind, move |args| {
        let joined = args.join(", ");
        let replies: Vec<String> = profile
            .replies
            .iter()
            .map(|r| r.replace("{args}", &joined))
            .collect();
        let participant: Participant = LeafAgent::new(
            name.clone(),
            profile.description.clone(),
            Arc::new(ScriptedWorker::new(replies)),
        )
        .into();
        Ok(participant)
    });
}

fn register_memory(registry: &mut ParticipantRegistry, path: PathBuf) {
    registry.register(DEFAULT_MEMORY_SINK, move |args| {
        let path = args.first().map(PathBuf::from).unwrap_or_else(|| path.clone());
        let participant: Participant = LeafAgent::new(
            DEFAULT_MEMORY_SINK,
            "Remembers summaries of past conversations",
            Arc::new(ScriptedWorker::new(["Noted."])),
        )
        .with_memory(Arc::new(JsonlMemorySink::new(path)))
        .into();
        Ok(participant)
    });
}

fn register_team(
    registry: &mut ParticipantRegistry,
    kind: &str,
    profile: TeamProfile,
    members: Arc<ParticipantRegistry>,
) {
    let name = kind.to_string();
    registry.register_async(kind, move |args| {
        let name = name.clone();
        let joined = args.join(", ");
        let description = profile.description.replace("{args}", &joined);
        let specs: Vec<String> = profile
            .members
            .iter()
            .map(|m| m.replace("{args}", &joined))
            .collect();
        let profile = profile.clone();
        let members = Arc::clone(&members);
        async move {
            let participants = members.resolve_all(&specs).await?;
            let token = profile
                .termination_token
                .unwrap_or_else(|| TERMINATE_TOKEN.to_string());
            let config = TeamConfig {
                name: name.clone(),
                description: description.clone(),
                max_turns: profile.max_turns,
                termination: vec![TerminationCondition::any_source(token)],
                first_speaker: profile.first_speaker,
                memory_sink: None,
                ..TeamConfig::default()
            };
            let team = Team::new(config, participants, Arc::new(RoundRobinModel))?;
            Ok::<Participant, BoxError>(SubTeam::new(name, description, team).into())
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{Orchestrator, RunStatus, TurnContext};

    const SAMPLE: &str = r#"
        [orchestrator]
        participants = ["task_organizer", "repository_team[/srv/app]", "interaction_memory"]
        first_speaker = "task_organizer"
        max_turns = 6

        [agents.task_organizer]
        description = "Plans the work"
        replies = ["Plan: hand {task} to the repository team", "All done. TERMINATE"]

        [agents.coder]
        description = "Edits code"
        replies = ["Edited files. DONE"]

        [teams.repository_team]
        description = "Works on one repository"
        members = ["coder"]
        termination_token = "DONE"
    "#;

    #[test]
    fn test_parse_sample_config() {
        let config = CliConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.orchestrator.max_turns, 6);
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.teams["repository_team"].max_turns, 10);
        assert_eq!(config.memory.path, default_memory_path());
    }

    #[test]
    fn test_registry_contains_agents_teams_and_memory() {
        let config = CliConfig::from_toml_str(SAMPLE).unwrap();
        let registry = config.build_registry();
        assert_eq!(
            registry.kinds(),
            vec!["coder", "interaction_memory", "repository_team", "task_organizer"]
        );
        assert!(config.missing_kinds(&registry).is_empty());
    }

    #[test]
    fn test_missing_kinds_are_reported() {
        let config = CliConfig::from_toml_str(
            r#"
            [orchestrator]
            participants = ["calendar", "github[org]"]
            "#,
        )
        .unwrap();
        let registry = config.build_registry();
        assert_eq!(config.missing_kinds(&registry), vec!["calendar", "github"]);
    }

    #[test]
    fn test_invalid_orchestrator_section_is_rejected() {
        let err = CliConfig::from_toml_str(
            r#"
            [orchestrator]
            participants = ["git[repo"]
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("git[repo"));
    }

    #[tokio::test]
    async fn test_team_args_reach_members() {
        let config = CliConfig::from_toml_str(
            r#"
            [orchestrator]
            participants = ["repository_team"]
            memory_sink = ""

            [agents.git]
            description = "Runs git"
            replies = ["Checked out a branch in {args} DONE"]

            [teams.repository_team]
            description = "Works on {args}"
            members = ["git[{args}]"]
            termination_token = "DONE"
            "#,
        )
        .unwrap();
        let registry = config.build_registry();

        let first = registry.resolve("repository_team[/srv/app]").await.unwrap();
        let second = registry.resolve("repository_team[/srv/other]").await.unwrap();
        assert_eq!(first.description(), "Works on /srv/app");
        assert_eq!(second.description(), "Works on /srv/other");

        for (participant, repo) in [(first, "/srv/app"), (second, "/srv/other")] {
            let history: Vec<huddle_core::Message> = Vec::new();
            let cancel = tokio_util::sync::CancellationToken::new();
            let ctx = TurnContext {
                task: "branch",
                history: &history,
                cancel: &cancel,
            };
            let response = participant.respond(&ctx).await.unwrap();
            assert_eq!(
                response.chat_message.text_content(),
                format!("Checked out a branch in {repo} DONE")
            );
        }
    }

    #[tokio::test]
    async fn test_sample_config_runs_and_writes_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CliConfig::from_toml_str(SAMPLE).unwrap();
        config.memory.path = dir.path().join("memory.jsonl");

        let orchestrator = Orchestrator::new(
            config.orchestrator.clone(),
            Arc::new(config.build_registry()),
            Arc::new(RoundRobinModel),
        )
        .unwrap();
        let result = orchestrator.run("the release").await.unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        let speakers: Vec<&str> = result.history.iter().map(|m| m.source.as_str()).collect();
        assert_eq!(
            speakers,
            vec!["task_organizer", "repository_team", "interaction_memory", "task_organizer"]
        );
        assert_eq!(result.history[1].text_content(), "Edited files. DONE");

        let memory = std::fs::read_to_string(dir.path().join("memory.jsonl")).unwrap();
        assert_eq!(memory.lines().count(), 1);
        assert!(memory.contains("Conversation summary:"));
    }
}
