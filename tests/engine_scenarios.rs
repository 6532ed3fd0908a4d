//! End-to-end engine scenarios: full runs through the loop controller and
//! the router, driven by a scripted reasoning service.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use axon::agent::{
    Engine, HeuristicClassifier, PlanStep, Planner, ReasoningService, ReasoningStep,
    ScriptedReasoner,
};
use axon::core::{AxonError, Config, HistoryEntry, Phase, RunStatus};
use axon::events::{EventFilter, EventType};
use axon::state::ConversationState;
use axon::tools::{
    FnHandler, Permission, ToolDefinition, ToolDescriptor, ToolOutput, ASK_USER_TOOL,
};

fn test_config(max_iterations: u32) -> Config {
    let mut config = Config::default();
    config.agent.max_iterations = max_iterations;
    config
}

fn echo_tool() -> ToolDefinition {
    ToolDefinition::new(
        "echo",
        "Echo the given text",
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }),
        Arc::new(FnHandler::new(|params, _| {
            Box::pin(async move {
                let text = params
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(ToolOutput::text(text))
            })
        })),
    )
}

fn flaky_tool() -> ToolDefinition {
    ToolDefinition::new(
        "flaky",
        "Always fails",
        json!({"type": "object", "properties": {}}),
        Arc::new(FnHandler::new(|_, _| {
            Box::pin(async { Err(AxonError::tool("upstream unavailable")) })
        })),
    )
}

fn guarded_tool() -> ToolDefinition {
    ToolDefinition::new(
        "guarded",
        "Echo, but only with execute permission",
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }),
        Arc::new(FnHandler::new(|params, _| {
            Box::pin(async move {
                let text = params
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(ToolOutput::text(text))
            })
        })),
    )
    .with_permissions([Permission::ExecuteCommands])
}

#[tokio::test]
async fn test_single_action_run_completes() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("There are 2 files.")
            .push_step(ReasoningStep::action(
                "Count the files first.",
                "echo",
                json!({"text": "2 files"}),
            ))
            .push_step(ReasoningStep::thought("I can answer now.")),
    );
    let engine = Engine::new(test_config(5), reasoner).unwrap();
    engine.registry().register(echo_tool()).unwrap();

    let response = engine.process("conv-a", "how many files?").await.unwrap();
    assert_eq!(response, "There are 2 files.");

    let shared = engine.states().get("conv-a").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(
        state
            .history
            .iter()
            .filter(|e| e.phase == Phase::Action)
            .count(),
        1
    );
    assert!(state.history.iter().any(|e| e.phase == Phase::ToolOutputAnalysis));
    assert!(state.history.iter().any(|e| e.phase == Phase::ResponseGeneration));

    let finals = engine
        .dispatcher()
        .history(&EventFilter::types([EventType::ResponseGenerated]));
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].payload.data["final"], json!(true));
    assert_eq!(
        engine
            .dispatcher()
            .history(&EventFilter::types([EventType::ConversationEnded]))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_exhausted_iterations_force_a_final_answer() {
    let mut reasoner = ScriptedReasoner::new("Best-effort summary of what was attempted.");
    for _ in 0..3 {
        // No capability, no conclusion: the loop keeps going until the bound.
        reasoner = reasoner.push_step(ReasoningStep::default());
    }
    let engine = Engine::new(test_config(3), Arc::new(reasoner)).unwrap();

    let response = engine.process("conv-b", "do something vague").await.unwrap();
    assert_eq!(response, "Best-effort summary of what was attempted.");

    let shared = engine.states().get("conv-b").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.iteration, 3);
    assert!(state
        .history
        .iter()
        .any(|e| e.phase == Phase::SystemMessage && e.content.contains("Max iterations")));

    let warnings = engine
        .dispatcher()
        .history(&EventFilter::types([EventType::SystemWarning]));
    assert!(warnings
        .iter()
        .any(|e| e.payload.data["reason"] == json!("max iterations reached")));
}

#[tokio::test]
async fn test_permission_denial_fails_the_run_immediately() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("unreachable")
            .push_step(ReasoningStep::action(
                "Try the guarded capability.",
                "guarded",
                json!({"text": "hi"}),
            ))
            .push_step(ReasoningStep::thought("must never be consulted")),
    );
    let engine = Engine::new(
        test_config(5),
        Arc::clone(&reasoner) as Arc<dyn ReasoningService>,
    )
    .unwrap();
    engine.registry().register(guarded_tool()).unwrap();

    let error = engine.process("conv-c", "run it").await.unwrap_err();
    assert!(error.to_string().contains("Permission denied"));

    // The denial is fatal: the queued second step was never consumed.
    assert_eq!(reasoner.remaining(), 1);

    let shared = engine.states().get("conv-c").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Failed);

    let errors = engine
        .dispatcher()
        .history(&EventFilter::types([EventType::SystemError]));
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_tool_failure_is_reflected_and_recovered() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("Recovered via the fallback path.")
            .push_step(ReasoningStep::action("Try the flaky one.", "flaky", json!({})))
            .push_step(ReasoningStep::thought("That failed; answering from context.")),
    );
    let engine = Engine::new(test_config(5), reasoner).unwrap();
    engine.registry().register(flaky_tool()).unwrap();

    let response = engine.process("conv-d", "fetch the data").await.unwrap();
    assert_eq!(response, "Recovered via the fallback path.");

    let shared = engine.states().get("conv-d").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state
        .history
        .iter()
        .any(|e| e.phase == Phase::Reflection && e.content.contains("flaky")));
}

#[tokio::test]
async fn test_malformed_reasoning_fails_the_run() {
    let reasoner = Arc::new(ScriptedReasoner::new("unreachable").push_step(ReasoningStep {
        error: Some("unparseable reasoning output".into()),
        ..ReasoningStep::default()
    }));
    let engine = Engine::new(test_config(5), reasoner).unwrap();

    let error = engine.process("conv-e", "anything").await.unwrap_err();
    assert!(error.to_string().contains("no usable output"));
}

async fn wait_for_request(engine: &Engine) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let requests = engine
                .dispatcher()
                .history(&EventFilter::types([EventType::UserInputRequested]));
            if let Some(event) = requests.into_iter().next() {
                return event.id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no user input request appeared")
}

#[tokio::test]
async fn test_pause_and_resume_through_interaction() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("Dark mode it is.")
            .push_step(ReasoningStep::action(
                "Need the user's preference.",
                ASK_USER_TOOL,
                json!({"question": "light or dark?"}),
            ))
            .push_step(ReasoningStep::thought("Preference received.")),
    );
    let engine = Arc::new(Engine::new(test_config(5), reasoner).unwrap());
    engine.grant_permission(Permission::UserInteraction);

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.process("conv-f", "set my theme").await })
    };

    let correlation_id = wait_for_request(&engine).await;
    assert!(engine.resolve_interaction(&correlation_id, "dark"));
    // Resolving twice finds nothing waiting.
    assert!(!engine.resolve_interaction(&correlation_id, "dark again"));

    let response = runner.await.unwrap().unwrap();
    assert_eq!(response, "Dark mode it is.");

    let shared = engine.states().get("conv-f").unwrap();
    let state = shared.lock().await;
    assert!(state
        .history
        .iter()
        .any(|e| e.phase == Phase::UserInput && e.content == "dark"));

    let received = engine
        .dispatcher()
        .history(&EventFilter::types([EventType::UserInputReceived]));
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].correlation_id(),
        Some(correlation_id.as_str())
    );
}

#[tokio::test]
async fn test_concurrent_run_on_same_conversation_is_rejected() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("First run done.")
            .push_step(ReasoningStep::action(
                "Hold the run open.",
                ASK_USER_TOOL,
                json!({"question": "continue?"}),
            ))
            .push_step(ReasoningStep::thought("Proceeding.")),
    );
    let engine = Arc::new(Engine::new(test_config(5), reasoner).unwrap());
    engine.grant_permission(Permission::UserInteraction);

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.process("conv-g", "first").await })
    };
    let correlation_id = wait_for_request(&engine).await;

    // The first run is paused but still owns the conversation.
    let second = engine.process("conv-g", "second").await;
    assert!(matches!(second, Err(AxonError::ConversationBusy(_))));

    assert!(engine.resolve_interaction(&correlation_id, "yes"));
    assert_eq!(runner.await.unwrap().unwrap(), "First run done.");

    // Once the run is over the conversation accepts work again.
    let third = engine.process("conv-g", "third").await.unwrap();
    assert_eq!(third, "First run done.");
}

#[tokio::test]
async fn test_router_direct_dispatch_skips_reasoning() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("unreachable")
            .push_step(ReasoningStep::thought("should not be consulted")),
    );
    let engine = Engine::new(
        test_config(5),
        Arc::clone(&reasoner) as Arc<dyn ReasoningService>,
    )
    .unwrap()
        .with_router(Box::new(HeuristicClassifier::new()), None);
    engine.registry().register(echo_tool()).unwrap();

    let response = engine
        .process("conv-h", r#"/echo {"text": "pong"}"#)
        .await
        .unwrap();
    assert_eq!(response, "pong");
    assert_eq!(reasoner.remaining(), 1);
}

#[tokio::test]
async fn test_router_falls_through_to_the_loop() {
    let reasoner = Arc::new(
        ScriptedReasoner::new("Handled by the loop.")
            .push_step(ReasoningStep::thought("No fast path applies.")),
    );
    let engine = Engine::new(test_config(5), reasoner)
        .unwrap()
        .with_router(Box::new(HeuristicClassifier::new()), None);

    let response = engine
        .process("conv-i", "just a plain request")
        .await
        .unwrap();
    assert_eq!(response, "Handled by the loop.");
}

struct FixedPlanner(Vec<PlanStep>);

#[async_trait::async_trait]
impl Planner for FixedPlanner {
    async fn plan(
        &self,
        _state: &ConversationState,
        _tools: &[ToolDescriptor],
    ) -> axon::Result<Vec<PlanStep>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_router_plan_with_fallback_and_optional_step() {
    let steps = vec![
        PlanStep::new("flaky", json!({}), "primary lookup").with_fallback(1),
        PlanStep::new("echo", json!({"text": "fallback data"}), "secondary lookup"),
        PlanStep::new("flaky", json!({}), "optional enrichment").optional(),
    ];
    let reasoner = Arc::new(ScriptedReasoner::new("Plan finished."));
    let engine = Engine::new(test_config(10), reasoner)
        .unwrap()
        .with_router(
            Box::new(HeuristicClassifier::new()),
            Some(Arc::new(FixedPlanner(steps))),
        );
    engine.registry().register(echo_tool()).unwrap();
    engine.registry().register(flaky_tool()).unwrap();

    let response = engine.process("conv-j", "gather the data").await.unwrap();
    assert_eq!(response, "Plan finished.");

    let shared = engine.states().get("conv-j").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state
        .history
        .iter()
        .any(|e| e.phase == Phase::SystemMessage && e.content.contains("skipped after failure")));
}

#[tokio::test]
async fn test_router_plan_required_failure_fails_the_run() {
    let steps = vec![PlanStep::new("flaky", json!({}), "the only step")];
    let reasoner = Arc::new(ScriptedReasoner::new("unreachable"));
    let engine = Engine::new(test_config(10), reasoner)
        .unwrap()
        .with_router(
            Box::new(HeuristicClassifier::new()),
            Some(Arc::new(FixedPlanner(steps))),
        );
    engine.registry().register(flaky_tool()).unwrap();

    let error = engine.process("conv-k", "gather the data").await.unwrap_err();
    assert!(error.to_string().contains("required plan step"));
}

#[tokio::test]
async fn test_respond_tool_completes_the_run() {
    let reasoner = Arc::new(ScriptedReasoner::new("unused").push_step(ReasoningStep::action(
        "Answer directly.",
        "respond",
        json!({"message": "The answer is 42."}),
    )));
    let engine = Engine::new(test_config(5), reasoner).unwrap();

    let response = engine.process("conv-l", "what is the answer?").await.unwrap();
    assert_eq!(response, "The answer is 42.");

    let shared = engine.states().get("conv-l").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.iteration, 1);
}

#[tokio::test]
async fn test_router_direct_interactive_dispatch_waits_for_the_answer() {
    let reasoner = Arc::new(ScriptedReasoner::new("unused"));
    let engine = Arc::new(
        Engine::new(test_config(5), reasoner)
            .unwrap()
            .with_router(Box::new(HeuristicClassifier::new()), None),
    );
    engine.grant_permission(Permission::UserInteraction);

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .process("conv-n", r#"/ask_user {"question": "light or dark?"}"#)
                .await
        })
    };

    let correlation_id = wait_for_request(&engine).await;
    assert!(engine.resolve_interaction(&correlation_id, "dark"));

    // The interactive step's output is the user's answer, never the
    // waiting placeholder.
    let response = runner.await.unwrap().unwrap();
    assert_eq!(response, "dark");

    let shared = engine.states().get("conv-n").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state
        .history
        .iter()
        .any(|e| e.phase == Phase::UserInput && e.content == "dark"));
}

#[tokio::test]
async fn test_router_plan_interactive_step_resumes() {
    let steps = vec![
        PlanStep::new(
            ASK_USER_TOOL,
            json!({"question": "which environment?"}),
            "confirm the target",
        ),
        PlanStep::new("echo", json!({"text": "deploying"}), "do the work"),
    ];
    let reasoner = Arc::new(ScriptedReasoner::new("Deployed to staging."));
    let engine = Arc::new(
        Engine::new(test_config(10), reasoner)
            .unwrap()
            .with_router(
                Box::new(HeuristicClassifier::new()),
                Some(Arc::new(FixedPlanner(steps))),
            ),
    );
    engine.registry().register(echo_tool()).unwrap();
    engine.grant_permission(Permission::UserInteraction);

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.process("conv-o", "deploy the service").await })
    };

    let correlation_id = wait_for_request(&engine).await;
    assert!(engine.resolve_interaction(&correlation_id, "staging"));

    let response = runner.await.unwrap().unwrap();
    assert_eq!(response, "Deployed to staging.");

    let shared = engine.states().get("conv-o").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Completed);
    assert!(state
        .history
        .iter()
        .any(|e| e.phase == Phase::UserInput && e.content == "staging"));
}

struct UnavailableReasoner;

#[async_trait::async_trait]
impl ReasoningService for UnavailableReasoner {
    async fn generate_reasoning(
        &self,
        _state: &ConversationState,
        _tools: &[ToolDescriptor],
        _recent_history: &[HistoryEntry],
        _memory_digest: &str,
    ) -> axon::Result<ReasoningStep> {
        Err(AxonError::reasoning("model endpoint unavailable"))
    }

    async fn generate_final_response(&self, _state: &ConversationState) -> axon::Result<String> {
        Err(AxonError::reasoning("model endpoint unavailable"))
    }
}

#[tokio::test]
async fn test_reasoning_service_error_fails_the_run() {
    let engine = Engine::new(test_config(5), Arc::new(UnavailableReasoner)).unwrap();

    let error = engine.process("conv-q", "anything").await.unwrap_err();
    assert!(error.to_string().contains("model endpoint unavailable"));

    let shared = engine.states().get("conv-q").unwrap();
    let state = shared.lock().await;
    assert_eq!(state.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_clear_conversation_drops_state_and_memory() {
    let reasoner = Arc::new(ScriptedReasoner::new("done"));
    let engine = Engine::new(test_config(3), reasoner).unwrap();
    engine.process("conv-m", "hello").await.unwrap();
    assert!(engine.states().get("conv-m").is_some());

    engine.clear_conversation("conv-m");
    assert!(engine.states().get("conv-m").is_none());
    assert!(engine.memory().short_term("conv-m").is_empty());
}
