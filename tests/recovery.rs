// tests/recovery.rs

use std::time::Duration;

use serde_json::json;

use agentdag::assembly::{QualityGate, Section};
use agentdag::context::SHARED_CONTEXT;
use agentdag::engine::Orchestrator;
use agentdag::errors::AgentdagError;
use agentdag::types::UnitState;
use agentdag_test_utils::units::{ExecutionLog, echo_unit, failing_unit, fixed_unit};
use agentdag_test_utils::{init_tracing, seed, with_timeout};

const NO_DEPS: [&str; 0] = [];

#[tokio::test]
async fn failed_run_restores_seeded_context_and_resets_statuses() {
    init_tracing();
    let log = ExecutionLog::new();

    let mut orch = Orchestrator::new();
    orch.register("research", NO_DEPS, fixed_unit(json!("notes"), Duration::ZERO, log.clone()))
        .unwrap();
    orch.register("draft", ["research"], failing_unit("provider quota exceeded", log.clone()))
        .unwrap();
    orch.register("review", ["draft"], echo_unit(log.clone())).unwrap();

    let ctx = orch.context();
    ctx.lock()
        .initialize_shared(seed(json!({"client": "Acme", "weeks": 6})));
    let shared_version_before = ctx.lock().version_of(SHARED_CONTEXT);

    let err = with_timeout(orch.run(seed(json!({"budget": 1000}))))
        .await
        .unwrap_err();

    match err {
        AgentdagError::RunIncomplete { failed, unreached } => {
            assert_eq!(failed, vec!["draft"]);
            assert_eq!(unreached, vec!["review"]);
        }
        other => panic!("expected RunIncomplete, got {other:?}"),
    }

    let store = ctx.lock();
    // Context is back to the point right after seeding: the seed survives,
    // unit outputs written during the run do not.
    assert_eq!(
        store.shared(),
        &seed(json!({"client": "Acme", "weeks": 6, "budget": 1000}))
    );
    assert_eq!(store.output_of("research"), None);
    assert!(store.unit_context("research").is_none());

    // Versions and history are never rolled back.
    assert_eq!(store.version_of(SHARED_CONTEXT), shared_version_before + 1);
    assert_eq!(store.version_of("research"), 1);
    assert!(store.history().iter().any(|u| u.context_name == "research"));
    drop(store);

    assert!(
        orch.status_handle()
            .snapshot()
            .iter()
            .all(|v| v.state == UnitState::Pending)
    );
    assert_eq!(log.count("review"), 0);
}

#[tokio::test]
async fn cycle_is_fatal_and_nothing_executes() {
    init_tracing();
    let log = ExecutionLog::new();

    let mut orch = Orchestrator::new();
    orch.register("a", ["b"], echo_unit(log.clone())).unwrap();
    orch.register("b", ["a"], echo_unit(log.clone())).unwrap();

    let err = with_timeout(orch.run(seed(json!({"k": "v"}))))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentdagError::DependencyCycle(_)));
    assert!(log.entries().is_empty());
    assert_eq!(orch.context().lock().shared()["k"], json!("v"));
}

struct RejectShort;

impl QualityGate for RejectShort {
    fn validate_section(&self, section: &Section) -> bool {
        section.content.as_str().is_some_and(|s| s.len() >= 5)
    }
}

#[tokio::test]
async fn quality_gate_rejection_triggers_recovery() {
    init_tracing();
    let log = ExecutionLog::new();

    let mut orch = Orchestrator::new().with_gate(RejectShort);
    orch.register("long", NO_DEPS, fixed_unit(json!("plenty of text"), Duration::ZERO, log.clone()))
        .unwrap();
    orch.register("short", NO_DEPS, fixed_unit(json!("hm"), Duration::ZERO, log.clone()))
        .unwrap();

    let err = with_timeout(orch.run(seed(json!({})))).await.unwrap_err();

    match err {
        AgentdagError::QualityRejected(sections) => assert_eq!(sections, vec!["short"]),
        other => panic!("expected QualityRejected, got {other:?}"),
    }
    assert_eq!(orch.context().lock().output_of("long"), None);
    assert_eq!(
        orch.status_handle().state_of("long"),
        Some(UnitState::Pending)
    );
}

#[tokio::test]
async fn rerun_after_recovery_executes_everything_again() {
    init_tracing();
    let log = ExecutionLog::new();

    let mut orch = Orchestrator::new();
    orch.register("one", NO_DEPS, echo_unit(log.clone())).unwrap();
    orch.register("two", ["one"], echo_unit(log.clone())).unwrap();

    with_timeout(orch.run(seed(json!({})))).await.unwrap();
    let point = {
        let ctx = orch.context();
        let store = ctx.lock();
        agentdag::engine::RecoveryPoint::capture(&store)
    };
    orch.recover(point, &AgentdagError::ConfigError("manual reset".to_string()))
        .unwrap();

    with_timeout(orch.run(seed(json!({})))).await.unwrap();
    assert_eq!(log.count("one"), 2);
    assert_eq!(log.count("two"), 2);
}
