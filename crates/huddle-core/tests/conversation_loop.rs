//! Conversation loop behaviour through the public streaming API.
//!
//! Teams are built from fake workers and a scripted selection model so every
//! turn is deterministic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use huddle_core::fakes::{
    CancellingWorker, FailingWorker, PanickingWorker, PendingSelectionModel, PendingWorker,
    RecordingMemorySink, ScriptedSelectionModel, StaticWorker,
};
use huddle_core::{
    BoxError, ChatWorker, ConversationEvent, FailureKind, InputSource, LeafAgent, Message,
    MessageKind, Participant, Response, RoundRobinModel, RunStatus, SubTeam, Team, TeamConfig,
    TerminationCondition, UserProxy, WorkerRequest, DEFAULT_MEMORY_SINK,
};

fn leaf(name: &str, worker: Arc<dyn ChatWorker>) -> Participant {
    LeafAgent::new(name, format!("{name} agent"), worker).into()
}

fn memory_leaf(sink: Arc<RecordingMemorySink>) -> Participant {
    LeafAgent::new(
        DEFAULT_MEMORY_SINK,
        "Stores past interactions",
        Arc::new(StaticWorker::new("noted")),
    )
    .with_memory(sink)
    .into()
}

fn config(max_turns: u32) -> TeamConfig {
    TeamConfig {
        max_turns,
        ..TeamConfig::default()
    }
}

struct QueuedInput(Mutex<VecDeque<String>>);

impl QueuedInput {
    fn new(lines: &[&str]) -> Self {
        Self(Mutex::new(lines.iter().map(|l| l.to_string()).collect()))
    }
}

#[async_trait]
impl InputSource for QueuedInput {
    async fn read_line(&self, _prompt: &str) -> Result<Option<String>, BoxError> {
        Ok(self.0.lock().unwrap().pop_front())
    }
}

/// Calls a tool before answering.
struct ToolUsingWorker;

#[async_trait]
impl ChatWorker for ToolUsingWorker {
    async fn respond(&self, request: WorkerRequest<'_>) -> Result<Response, BoxError> {
        Ok(Response::new(Message::text(request.agent, "status is clean")).with_inner(vec![
            Message::tool_request(request.agent, json!([{ "name": "git_status" }])),
            Message::tool_result(request.agent, json!([{ "content": "clean" }])),
        ]))
    }
}

#[tokio::test]
async fn test_two_turn_scenario_completes_on_terminate() {
    let model = Arc::new(ScriptedSelectionModel::new(["task_organizer", "worker"]));
    let team = Team::new(
        config(3),
        vec![
            leaf("task_organizer", Arc::new(StaticWorker::new("Plan: 1. do the work"))),
            leaf("worker", Arc::new(StaticWorker::new("work finished...TERMINATE"))),
        ],
        model.clone(),
    )
    .unwrap();

    let events: Vec<ConversationEvent> = team.run_stream("ship the feature").collect().await;

    assert_eq!(events.len(), 5);
    assert!(matches!(
        &events[0],
        ConversationEvent::SpeakerSelected { turn: 1, name } if name == "task_organizer"
    ));
    assert!(matches!(&events[1], ConversationEvent::Message(m) if m.source == "task_organizer"));
    assert!(matches!(
        &events[2],
        ConversationEvent::SpeakerSelected { turn: 2, name } if name == "worker"
    ));
    assert!(matches!(&events[3], ConversationEvent::Message(m) if m.source == "worker"));

    let ConversationEvent::Final(result) = &events[4] else {
        panic!("Expected Final, got {:?}", events[4]);
    };
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stop_reason, "Text 'TERMINATE' mentioned");
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.turn_count, 2);
    assert_eq!(model.calls() as u32, result.turn_count);
    assert!(result.failure.is_none());
}

#[tokio::test]
async fn test_selection_request_sees_task_and_prior_turns() {
    let model = Arc::new(ScriptedSelectionModel::new(["task_organizer", "worker"]));
    let team = Team::new(
        config(2),
        vec![
            leaf("task_organizer", Arc::new(StaticWorker::new("plan ready"))),
            leaf("worker", Arc::new(StaticWorker::new("working"))),
        ],
        model.clone(),
    )
    .unwrap();

    team.run("fix ci").await.unwrap();

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].history, "user: fix ci");
    assert_eq!(requests[0].last_speaker, None);
    assert_eq!(requests[1].history, "user: fix ci\ntask_organizer: plan ready");
    assert_eq!(requests[1].last_speaker.as_deref(), Some("task_organizer"));
    assert!(requests[1].prompt.contains("worker: worker agent"));
}

#[tokio::test]
async fn test_turn_budget_bounds_the_run() {
    let team = Team::new(
        config(3),
        vec![
            leaf("a", Arc::new(StaticWorker::new("still going"))),
            leaf("b", Arc::new(StaticWorker::new("me too"))),
        ],
        Arc::new(RoundRobinModel),
    )
    .unwrap();

    let result = team.run("never ends").await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stop_reason, "max turns reached");
    assert_eq!(result.turn_count, 3);
    let speakers: Vec<&str> = result.history.iter().map(|m| m.source.as_str()).collect();
    assert_eq!(speakers, vec!["a", "b", "a"]);
}

#[tokio::test]
async fn test_bye_only_counts_from_user_proxy() {
    let team_config = TeamConfig {
        termination: vec![TerminationCondition::from_sources("BYE", ["user_proxy"])],
        ..config(10)
    };
    let model = Arc::new(ScriptedSelectionModel::new(["worker", "user_proxy"]));
    let team = Team::new(
        team_config,
        vec![
            leaf("worker", Arc::new(StaticWorker::new("BYE from the worker"))),
            UserProxy::participant(Arc::new(QueuedInput::new(&["ok, BYE"]))),
        ],
        model,
    )
    .unwrap();

    let result = team.run("chat").await.unwrap();
    assert_eq!(result.turn_count, 2);
    assert_eq!(result.stop_reason, "Text 'BYE' mentioned by user_proxy");
    assert_eq!(result.history[1].source, "user_proxy");
}

#[tokio::test]
async fn test_inner_messages_precede_final_message() {
    let team = Team::new(
        config(1),
        vec![leaf("git", Arc::new(ToolUsingWorker))],
        Arc::new(RoundRobinModel),
    )
    .unwrap();

    let events: Vec<ConversationEvent> = team.run_stream("check status").collect().await;
    let kinds: Vec<MessageKind> = events
        .iter()
        .filter_map(|e| match e {
            ConversationEvent::Message(m) => Some(m.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![MessageKind::ToolRequest, MessageKind::ToolResult, MessageKind::Text]
    );

    let ConversationEvent::Final(result) = events.last().unwrap() else {
        panic!("stream must end with Final");
    };
    assert_eq!(result.turn_count, 1);
    assert_eq!(result.history.len(), 3);
    let seqs: Vec<u64> = result.history.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_participant_error_fails_run_without_checkpoint() {
    let sink = Arc::new(RecordingMemorySink::new());
    let model = Arc::new(ScriptedSelectionModel::new(["worker"]));
    let team = Team::new(
        config(5),
        vec![
            leaf("worker", Arc::new(FailingWorker::new("upstream timeout"))),
            memory_leaf(sink.clone()),
        ],
        model,
    )
    .unwrap();

    let result = team.run("do it").await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::ParticipantInvocation);
    assert_eq!(failure.participant.as_deref(), Some("worker"));
    assert_eq!(failure.detail, "upstream timeout");
    assert_eq!(result.turn_count, 0);
    assert!(sink.writes().is_empty());
}

#[tokio::test]
async fn test_participant_panic_becomes_failure() {
    let team = Team::new(
        config(5),
        vec![leaf("worker", Arc::new(PanickingWorker))],
        Arc::new(RoundRobinModel),
    )
    .unwrap();

    let result = team.run("do it").await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.failure.unwrap().detail.contains("worker exploded"));
}

#[tokio::test]
async fn test_invalid_selection_fails_run() {
    let model = Arc::new(ScriptedSelectionModel::new(["nobody"]));
    let team = Team::new(
        config(5),
        vec![
            leaf("a", Arc::new(StaticWorker::new("x"))),
            leaf("b", Arc::new(StaticWorker::new("y"))),
        ],
        model,
    )
    .unwrap();

    let result = team.run("t").await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Selection);
    assert!(failure.detail.contains("nobody"));
    assert!(result.history.is_empty());
}

#[tokio::test]
async fn test_missing_first_speaker_fails_run() {
    let team_config = TeamConfig {
        first_speaker: Some("task_organizer".to_string()),
        ..config(5)
    };
    let model = Arc::new(ScriptedSelectionModel::new(["a"]));
    let team = Team::new(
        team_config,
        vec![
            leaf("a", Arc::new(StaticWorker::new("x"))),
            leaf("b", Arc::new(StaticWorker::new("y"))),
        ],
        model.clone(),
    )
    .unwrap();

    let result = team.run("t").await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.stop_reason.contains("task_organizer"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_completed_run_checkpoints_exactly_once() {
    let sink = Arc::new(RecordingMemorySink::new());
    let model = Arc::new(ScriptedSelectionModel::new(["task_organizer", "worker"]));
    let team = Team::new(
        config(5),
        vec![
            leaf("task_organizer", Arc::new(StaticWorker::new("plan"))),
            leaf("worker", Arc::new(StaticWorker::new("done TERMINATE"))),
            memory_leaf(sink.clone()),
        ],
        model,
    )
    .unwrap();

    let result = team.run("t").await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);

    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].0,
        "Conversation summary:\ntask_organizer: plan\nworker: done TERMINATE"
    );
    assert_eq!(writes[0].1.stop_reason, "Text 'TERMINATE' mentioned");
    assert_eq!(writes[0].1.conversation_id, result.conversation_id);
}

#[tokio::test]
async fn test_failed_memory_write_keeps_run_completed() {
    let sink = Arc::new(RecordingMemorySink::failing("disk full"));
    let model = Arc::new(ScriptedSelectionModel::new(["worker"]));
    let team = Team::new(
        config(5),
        vec![
            leaf("worker", Arc::new(StaticWorker::new("TERMINATE"))),
            memory_leaf(sink),
        ],
        model,
    )
    .unwrap();

    let result = team.run("t").await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.failure.is_none());
}

#[tokio::test]
async fn test_cancel_between_turns_interrupts() {
    let cancel = CancellationToken::new();
    let sink = Arc::new(RecordingMemorySink::new());
    let model = Arc::new(ScriptedSelectionModel::new(["task_organizer", "worker"]));
    let worker = Arc::new(StaticWorker::new("TERMINATE"));
    let team = Team::new(
        config(5),
        vec![
            leaf(
                "task_organizer",
                Arc::new(CancellingWorker::new("plan", cancel.clone())),
            ),
            leaf("worker", worker.clone()),
            memory_leaf(sink.clone()),
        ],
        model.clone(),
    )
    .unwrap();

    let result = team
        .run_stream_with_cancel("t", cancel)
        .into_result()
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Interrupted);
    assert_eq!(result.stop_reason, "User interruption");
    assert_eq!(result.turn_count, 1);
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.history[1].source, "system");
    assert_eq!(result.history[1].text_content(), "Task was interrupted by user.");
    assert_eq!(model.calls(), 1);
    assert_eq!(worker.calls(), 0);
    assert!(sink.writes().is_empty());
}

#[tokio::test]
async fn test_cancel_during_turn_interrupts() {
    let cancel = CancellationToken::new();
    let team = Team::new(
        config(5),
        vec![leaf("slow", Arc::new(PendingWorker::new()))],
        Arc::new(RoundRobinModel),
    )
    .unwrap();

    let stream = team.run_stream_with_cancel("t", cancel.clone());
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), stream.into_result())
        .await
        .expect("interrupted run must still produce a final event")
        .unwrap();
    assert_eq!(result.status, RunStatus::Interrupted);
    assert_eq!(result.turn_count, 0);
    assert_eq!(result.history.len(), 1);
}

#[tokio::test]
async fn test_cancel_during_selection_interrupts() {
    let cancel = CancellationToken::new();
    let model = Arc::new(PendingSelectionModel::new());
    let planner = Arc::new(StaticWorker::new("plan"));
    let coder = Arc::new(StaticWorker::new("TERMINATE"));
    let team = Team::new(
        config(5),
        vec![leaf("planner", planner.clone()), leaf("coder", coder.clone())],
        model.clone(),
    )
    .unwrap();

    let stream = team.run_stream_with_cancel("t", cancel.clone());
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), stream.into_result())
        .await
        .expect("interrupted run must still produce a final event")
        .unwrap();
    assert_eq!(result.status, RunStatus::Interrupted);
    assert_eq!(result.turn_count, 0);
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.history[0].source, "system");
    assert_eq!(model.calls(), 1);
    assert_eq!(planner.calls(), 0);
    assert_eq!(coder.calls(), 0);
}

#[tokio::test]
async fn test_dropped_stream_abandons_running_turn() {
    let worker = Arc::new(PendingWorker::new());
    let team = Team::new(
        config(5),
        vec![leaf("slow", worker.clone())],
        Arc::new(RoundRobinModel),
    )
    .unwrap();

    let mut stream = team.run_stream("t");
    let first = stream.next().await.unwrap();
    assert!(matches!(first, ConversationEvent::SpeakerSelected { turn: 1, .. }));

    tokio::time::timeout(Duration::from_secs(5), async {
        while worker.started() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker turn never started");
    drop(stream);

    tokio::time::timeout(Duration::from_secs(5), async {
        while worker.abandoned() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loop kept the turn running after the consumer left");
    assert_eq!(worker.started(), 1);
}

#[tokio::test]
async fn test_sub_team_answers_as_one_participant() {
    let inner_config = TeamConfig {
        name: "repository_team".to_string(),
        termination: vec![TerminationCondition::any_source("DONE")],
        memory_sink: None,
        ..config(5)
    };
    let inner = Team::new(
        inner_config,
        vec![
            leaf("planner", Arc::new(StaticWorker::new("edit lib.rs"))),
            leaf("coder", Arc::new(StaticWorker::new("patch applied DONE"))),
        ],
        Arc::new(ScriptedSelectionModel::new(["planner", "coder"])),
    )
    .unwrap();

    let outer = Team::new(
        config(5),
        vec![
            SubTeam::new("repository_team", "Edits the repository", inner).into(),
            leaf("reviewer", Arc::new(StaticWorker::new("LGTM TERMINATE"))),
        ],
        Arc::new(ScriptedSelectionModel::new(["repository_team", "reviewer"])),
    )
    .unwrap();

    let result = outer.run("rename the crate").await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.turn_count, 2);
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.history[0].source, "repository_team");
    assert_eq!(result.history[0].text_content(), "patch applied DONE");
    assert_eq!(result.history[1].source, "reviewer");
}

#[tokio::test]
async fn test_failed_sub_team_fails_parent_turn() {
    let inner = Team::new(
        TeamConfig {
            memory_sink: None,
            ..config(5)
        },
        vec![leaf("coder", Arc::new(FailingWorker::new("compiler crashed")))],
        Arc::new(RoundRobinModel),
    )
    .unwrap();
    let outer = Team::new(
        config(5),
        vec![SubTeam::new("repository_team", "Edits the repository", inner).into()],
        Arc::new(RoundRobinModel),
    )
    .unwrap();

    let result = outer.run("t").await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.participant.as_deref(), Some("repository_team"));
    assert!(failure.detail.contains("compiler crashed"));
}
