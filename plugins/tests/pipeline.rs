use std::sync::Arc;

use parawave_core::catalog::TaskCatalog;
use parawave_core::config::{AppConfig, FailureRecoveryPolicy};
use parawave_core::conflict::ConflictStatus;
use parawave_core::executor::types::TaskStatus;
use parawave_core::executor::{ExecutionEngine, ExecutionOpts, TaskRunner};
use parawave_core::report::{ActionKind, RunReport, RunStatus};
use parawave_plugins::factory::{build_report_renderer, build_retry, build_synthesis};
use parawave_plugins::runner::ReplayRunnerPlugin;
use pretty_assertions::assert_eq;

const CATALOG: &str = r#"
[[tasks]]
id = "security"
description = "Audit authentication"
domain = "security"
estimated_secs = 3

[[tasks]]
id = "architecture"
description = "Review service layout"
domain = "architecture"
estimated_secs = 2

[[tasks]]
id = "frontend"
description = "Review login flow"
domain = "frontend"
estimated_secs = 2

[[tasks]]
id = "synthesis"
description = "Merge the reviews"
dependencies = ["security", "architecture", "frontend"]
estimated_secs = 1
"#;

const RECORDED: &str = r#"{
    "security": {"delay_ms": 3000, "output": {
        "summary": "Only OAuth2 is acceptable.",
        "constraints": [{"claim": "auth", "allowed": ["oauth2"], "reason": "SOC2"}],
        "findings": [{"key": "sqli", "title": "SQL injection", "impact": 9, "probability": 0.6}]
    }},
    "architecture": {"delay_ms": 2000, "output": {
        "summary": "Keep the monolith.",
        "claims": {"auth": "oauth2", "db": "postgres"}
    }},
    "frontend": {"delay_ms": 2000, "output": {
        "summary": "Basic auth is simplest.",
        "claims": {"auth": "basic", "db": "postgres"}
    }},
    "synthesis": {"delay_ms": 1000, "output": {"summary": "merged"}}
}"#;

async fn run(strategy: &str, recorded: &str, policy: FailureRecoveryPolicy) -> RunReport {
    let catalog = TaskCatalog::from_toml_str(CATALOG).unwrap();
    let runner: Arc<dyn TaskRunner> = Arc::new(ReplayRunnerPlugin::from_json_str(recorded).unwrap());
    let mut opts = ExecutionOpts::default().with_policy(policy);
    opts.minimum_speedup_ratio = 1.5;

    ExecutionEngine::builder(opts)
        .with_runner(runner)
        .with_synthesis(build_synthesis(strategy).unwrap())
        .with_retry_strategy(build_retry(&AppConfig::default()).unwrap())
        .build()
        .unwrap()
        .run(&catalog)
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn integration_matrix_end_to_end() {
    let report = run("integration-matrix", RECORDED, FailureRecoveryPolicy::ContinueOthers).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.plan.stages(), vec![
        vec!["security".to_string(), "architecture".to_string(), "frontend".to_string()],
        vec!["synthesis".to_string()],
    ]);

    // 8s of estimates in ~4s of wall clock
    let perf = &report.performance;
    assert!((perf.speedup_ratio - 2.0).abs() < 0.05, "{}", perf.speedup_ratio);
    assert!(perf.passed);
    assert_eq!(perf.critical_path, vec!["security", "synthesis"]);

    let synthesis = &report.synthesis;
    assert_eq!(synthesis.strategy, "integration-matrix");
    assert_eq!(synthesis.included.len(), 4);
    assert_eq!(synthesis.resolved.len(), 1);
    assert_eq!(synthesis.resolved[0].status, ConflictStatus::AutoResolved);
    assert_eq!(synthesis.resolved[0].resolution.as_deref(), Some("oauth2"));

    assert_eq!(report.unresolved_conflicts.len(), 1);
    assert!(report.unresolved_conflicts[0].involves("frontend"));
    assert!(report
        .action_items
        .iter()
        .any(|a| a.kind == ActionKind::EscalatedConflict && a.subject == "auth"));

    let doc = build_report_renderer("markdown").unwrap().render(&report).unwrap();
    assert!(doc.contains("## Synthesis (`integration-matrix`)"));
    assert!(doc.contains("| frontend / synthesis | 0 | 0 |"));
}

#[tokio::test(start_paused = true)]
async fn synthesis_is_deterministic_across_runs() {
    let first = run("consensus", RECORDED, FailureRecoveryPolicy::ContinueOthers).await;
    let second = run("consensus", RECORDED, FailureRecoveryPolicy::ContinueOthers).await;

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(
        serde_json::to_string(&first.synthesis).unwrap(),
        serde_json::to_string(&second.synthesis).unwrap()
    );
    // one against one on auth
    assert_eq!(first.synthesis.escalated.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_recording_fails_task_and_cancels_dependents() {
    let recorded = r#"{
        "security": {"output": {"summary": "ok"}},
        "architecture": {"output": {"summary": "ok"}}
    }"#;
    let report = run("risk-matrix", recorded, FailureRecoveryPolicy::ContinueOthers).await;

    assert_eq!(report.status, RunStatus::CompletedWithFailures);
    let status = |id: &str| report.results.iter().find(|r| r.task_id == id).map(|r| r.status);
    assert_eq!(status("frontend"), Some(TaskStatus::Failed));
    assert_eq!(status("synthesis"), Some(TaskStatus::Cancelled));
    assert_eq!(status("security"), Some(TaskStatus::Succeeded));

    let json = build_report_renderer("json").unwrap().render(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["synthesis"]["strategy"], "risk-matrix");
}
