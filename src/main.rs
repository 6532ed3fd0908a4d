//! Axon - Agentic Orchestration Core
//!
//! Demo entry point: runs one prompt through the engine with a scripted
//! reasoning service and a small echo capability, printing the final answer
//! and the event trail. Real hosts embed the library and bring their own
//! `ReasoningService`.

use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use axon::agent::{Engine, ReasoningStep, ScriptedReasoner};
use axon::events::EventFilter;
use axon::tools::{FnHandler, Permission, ToolDefinition, ToolOutput};
use axon::Config;

/// Axon - Agentic Orchestration Core
#[derive(Parser, Debug)]
#[command(name = "axon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Prompt to run through the engine
    #[arg(long, short = 'p', default_value = "Demonstrate a reasoning-action run")]
    prompt: String,

    /// Override the iteration ceiling
    #[arg(long, short = 'm')]
    max_iterations: Option<u32>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load();
    if let Some(max_iterations) = args.max_iterations {
        config.agent.max_iterations = max_iterations;
    }
    if args.debug {
        config.agent.debug = true;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if config.agent.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Scripted run: inspect the workspace, then answer.
    let reasoner = Arc::new(
        ScriptedReasoner::new("The workspace inspection finished; see the event trail above.")
            .push_step(ReasoningStep::action(
                "I should inspect the workspace before answering.",
                "inspect_workspace",
                json!({"path": "."}),
            )),
    );

    let engine = Engine::new(config, reasoner)?;
    engine.grant_permission(Permission::ReadWorkspace);
    engine.registry().register(
        ToolDefinition::new(
            "inspect_workspace",
            "List entries at a path in the workspace",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Directory to inspect"}
                },
                "required": ["path"]
            }),
            Arc::new(FnHandler::new(|params, _ctx| {
                Box::pin(async move {
                    let path = params
                        .get("path")
                        .and_then(|p| p.as_str())
                        .unwrap_or(".")
                        .to_string();
                    let mut names = Vec::new();
                    let mut entries = tokio::fs::read_dir(&path).await?;
                    while let Some(entry) = entries.next_entry().await? {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                    names.sort();
                    Ok(ToolOutput::with_data(
                        format!("{} entries in {}", names.len(), path),
                        json!({"entries": names}),
                    ))
                })
            })),
        )
        .with_permissions([Permission::ReadWorkspace]),
    )?;

    let response = engine.process("demo", &args.prompt).await?;
    println!("{}", response);

    for event in engine.dispatcher().history(&EventFilter::all()) {
        println!("[{}] {}", event.kind, event.payload.data);
    }

    Ok(())
}
