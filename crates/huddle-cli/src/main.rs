//! Huddle - model-driven group conversations from the command line
//!
//! ## Commands
//!
//! - `run`: Run one task to completion and stream the conversation
//! - `chat`: Interactive session with a console-backed `user_proxy`
//! - `kinds`: List participant kinds provided by the config
//! - `check`: Validate the config without starting a conversation

mod wiring;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use huddle_core::{
    ConversationEvent, Message, MessageKind, Orchestrator, RoundRobinModel, RunStatus, TaskResult,
    METRICS,
};

use crate::wiring::CliConfig;

const INTERACTIVE_TASK: &str =
    "This is an interactive session. You can ask the user which request to process.";

#[derive(Parser)]
#[command(name = "huddle")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Coordinate a group of agents on a task", long_about = None)]
struct Cli {
    /// Path to huddle.toml
    #[arg(short, long, global = true, env = "HUDDLE_CONFIG", default_value = "huddle.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task without human input
    Run {
        /// Task description
        #[arg(short, long)]
        task: String,

        /// Override the configured turn budget
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// Start an interactive session; type BYE to end it
    Chat,

    /// List participant kinds provided by the config
    Kinds,

    /// Validate the config and report unresolved participant kinds
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    huddle_core::init_tracing(cli.json, level);

    let config = CliConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run { task, max_turns } => cmd_run(config, &task, max_turns).await,
        Commands::Chat => cmd_chat(config).await,
        Commands::Kinds => cmd_kinds(&config),
        Commands::Check => cmd_check(&config),
    }
}

async fn cmd_run(mut config: CliConfig, task: &str, max_turns: Option<u32>) -> Result<()> {
    config.orchestrator.enable_user_proxy = false;
    if let Some(max_turns) = max_turns {
        config.orchestrator.max_turns = max_turns;
    }

    println!("Orchestrating task: {}", task);
    println!("{}", "=".repeat(60));
    let result = stream_conversation(&config, task).await?;

    if let Some(last) = result.last_message() {
        println!("Final answer: {}", last.text_content());
    }
    finish(&result)
}

async fn cmd_chat(mut config: CliConfig) -> Result<()> {
    config.orchestrator.enable_user_proxy = true;

    println!("Huddle interactive session");
    println!("The orchestrator will request your input when needed.");
    println!("Type 'BYE' to end the session.");
    println!("{}", "=".repeat(60));

    let result = stream_conversation(&config, INTERACTIVE_TASK).await?;
    finish(&result)
}

fn cmd_kinds(config: &CliConfig) -> Result<()> {
    let registry = config.build_registry();
    for kind in registry.kinds() {
        let description = config
            .agents
            .get(kind)
            .map(|a| a.description.as_str())
            .or_else(|| config.teams.get(kind).map(|t| t.description.as_str()))
            .unwrap_or("memory sink");
        println!("{:<24} {}", kind, description);
    }
    Ok(())
}

fn cmd_check(config: &CliConfig) -> Result<()> {
    let registry = config.build_registry();
    let missing = config.missing_kinds(&registry);
    if !missing.is_empty() {
        bail!("Unresolved participant kinds: {}", missing.join(", "));
    }

    let orchestrator = &config.orchestrator;
    println!("Config OK: {}", orchestrator.name);
    println!("  participants: {}", orchestrator.participants.join(", "));
    println!("  max turns:    {}", orchestrator.max_turns);
    for condition in orchestrator.termination_conditions() {
        println!("  stops on:     {}", condition.description());
    }
    if let Some(first) = &orchestrator.first_speaker {
        println!("  first:        {}", first);
    }
    Ok(())
}

/// Start the conversation, print every event, and return the final result.
/// Ctrl-C interrupts the run; the final event still arrives.
async fn stream_conversation(config: &CliConfig, task: &str) -> Result<TaskResult> {
    let orchestrator = Orchestrator::new(
        config.orchestrator.clone(),
        Arc::new(config.build_registry()),
        Arc::new(RoundRobinModel),
    )
    .context("Failed to create orchestrator")?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            interrupt.cancel();
        }
    });

    let mut stream = orchestrator
        .start(task, cancel)
        .await
        .context("Failed to start conversation")?;

    while let Some(event) = stream.next().await {
        match event {
            ConversationEvent::SpeakerSelected { turn, name } => {
                println!("[turn {}] selected: {}", turn, name);
            }
            ConversationEvent::Message(message) => print_message(&message),
            ConversationEvent::Final(result) => {
                METRICS.flush();
                return Ok(result);
            }
        }
    }
    bail!("Conversation ended without a final result")
}

fn print_message(message: &Message) {
    let text = message.text_content();
    match message.kind {
        MessageKind::ToolRequest => println!("{}: tool request {}", message.source, truncate(&text, 150)),
        MessageKind::ToolResult => println!("{}: tool result {}", message.source, truncate(&text, 200)),
        MessageKind::Text | MessageKind::SelectionEvent => println!("{}: {}", message.source, text),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn finish(result: &TaskResult) -> Result<()> {
    println!("{}", "=".repeat(60));
    match result.status {
        RunStatus::Completed => {
            println!("Completed after {} turns: {}", result.turn_count, result.stop_reason);
            Ok(())
        }
        RunStatus::Interrupted => {
            println!("Interrupted after {} turns", result.turn_count);
            Ok(())
        }
        _ => bail!("Conversation failed: {}", result.stop_reason),
    }
}
