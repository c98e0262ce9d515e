use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use goalflow_agent::{ErrorKind, Orchestrator, TraceLog};
use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::ToolHandler;
use goalflow_core::types::{RunContext, ToolOutput};
use goalflow_test_utils::{sample_hits, RecordingWriter, ScriptedLookup};
use goalflow_tools::{CalcHandler, HandlerRegistry};

struct SleepyCalc;

impl ToolHandler for SleepyCalc {
    fn name(&self) -> &str {
        "calc"
    }

    fn handle<'a>(
        &'a self,
        _goal: &'a str,
        _context: &'a RunContext,
    ) -> BoxFuture<'a, Result<ToolOutput>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Err(GoalflowError::Handler {
                tool: "calc".into(),
                message: "overslept".into(),
            })
        })
    }
}

#[tokio::test]
async fn unknown_tool_terminates_for_every_bound() {
    for max in 1..=5u32 {
        let orchestrator = Orchestrator::builder(HandlerRegistry::new())
            .max_attempts(max)
            .build()
            .unwrap();

        let outcome = orchestrator.run("2+3*5", None).await;

        assert!(!outcome.accepted);
        assert_eq!(outcome.attempts, max);
        assert!(outcome.result.is_none());
        assert_eq!(outcome.errors.len(), max as usize);
        for (i, error) in outcome.errors.iter().enumerate() {
            assert_eq!(error.kind, ErrorKind::Dispatch);
            assert_eq!(error.message, "Unknown tool: calc");
            assert_eq!(error.cycle, i as u32);
        }
        // plan and interpret once, then one loop traversal per attempt.
        assert_eq!(outcome.steps.len(), 2 + 4 * max as usize);
        assert_eq!(outcome.steps.last().map(String::as_str), Some("decide"));
    }
}

#[tokio::test]
async fn acceptance_stops_the_loop() {
    let mut registry = HandlerRegistry::new();
    registry.register_handler(CalcHandler);
    let orchestrator = Orchestrator::builder(registry)
        .max_attempts(5)
        .build()
        .unwrap();

    let outcome = orchestrator.run("calculate 6 * 7", None).await;

    assert!(outcome.accepted);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.steps.iter().filter(|s| *s == "execute").count(), 1);
    assert_eq!(outcome.steps.iter().filter(|s| *s == "decide").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn handler_timeout_is_a_handler_error() {
    let mut registry = HandlerRegistry::new().with_max_timeout(1);
    registry.register_handler(SleepyCalc);
    let orchestrator = Orchestrator::builder(registry)
        .max_attempts(2)
        .build()
        .unwrap();

    let outcome = orchestrator.run("2*2", None).await;

    assert!(!outcome.accepted);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.errors_of(ErrorKind::Handler).count(), 2);
    assert!(outcome.errors[0].message.contains("timeout"));
}

#[tokio::test]
async fn concurrent_runs_do_not_share_state() {
    let registry = HandlerRegistry::with_builtins(
        Arc::new(ScriptedLookup::always(sample_hits(1))),
        5,
        Arc::new(RecordingWriter::new()),
    );
    let orchestrator = Arc::new(Orchestrator::builder(registry).build().unwrap());

    let goals = ["1+1", "2*3", "find tokio", "10/4"];
    let runs = goals.iter().map(|goal| {
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run(goal, None).await }
    });
    let outcomes = futures::future::join_all(runs).await;

    assert!(outcomes.iter().all(|o| o.accepted && o.attempts == 1));
    assert_eq!(outcomes[0].result.as_ref().and_then(ToolOutput::value), Some(2.0));
    assert_eq!(outcomes[1].result.as_ref().and_then(ToolOutput::value), Some(6.0));
    assert_eq!(outcomes[3].result.as_ref().and_then(ToolOutput::value), Some(2.5));

    let mut ids: Vec<&str> = outcomes.iter().map(|o| o.run_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), goals.len());
}

#[tokio::test]
async fn trace_log_records_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let (trace, writer) = TraceLog::spawn(dir.path());

    let mut registry = HandlerRegistry::new();
    registry.register_handler(CalcHandler);
    let orchestrator = Orchestrator::builder(registry)
        .interceptor(Arc::new(trace))
        .build()
        .unwrap();

    let outcome = orchestrator.run("2+2", None).await;
    drop(orchestrator);
    writer.await.unwrap();

    let path = dir.path().join(format!("{}.jsonl", outcome.run_id));
    let content = std::fs::read_to_string(path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(events.len(), 2 + 2 * outcome.steps.len());
    assert_eq!(events[0]["event"], "run_started");
    assert_eq!(events.last().unwrap()["event"], "run_finished");
    assert_eq!(events.last().unwrap()["detail"]["accepted"], true);
}
