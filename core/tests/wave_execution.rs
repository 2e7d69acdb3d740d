mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{engine, ok, opts, task, ScriptedRunner, Step};
use parawave_core::catalog::TaskCatalog;
use parawave_core::config::FailureRecoveryPolicy;
use parawave_core::executor::types::{TaskOutput, TaskStatus};
use parawave_core::report::RunStatus;
use parawave_core::ExecutorError;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn wave_of_four_runs_in_longest_task_time() {
    let catalog = TaskCatalog::new(vec![
        task("t1", 1, &[]),
        task("t2", 2, &[]),
        task("t3", 3, &[]),
        task("t4", 4, &[]),
    ]);
    let runner = Arc::new(
        ScriptedRunner::new()
            .script("t1", vec![ok(1)])
            .script("t2", vec![ok(2)])
            .script("t3", vec![ok(3)])
            .script("t4", vec![ok(4)]),
    );

    let start = Instant::now();
    let report = engine(runner, opts(FailureRecoveryPolicy::RetryFailed))
        .run(&catalog)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.plan.len(), 1);
    // baseline 10s of estimates over ~4s
    assert!((report.performance.speedup_ratio - 2.5).abs() < 0.05);
    assert!(!report.performance.passed);
}

#[tokio::test(start_paused = true)]
async fn dependents_receive_upstream_outputs_in_later_waves() {
    let catalog = TaskCatalog::new(vec![
        task("security", 1, &[]),
        task("performance", 1, &[]),
        task("synthesis", 1, &["security", "performance"]),
    ]);
    let runner = Arc::new(ScriptedRunner::new());
    let report = engine(runner.clone(), opts(FailureRecoveryPolicy::ContinueOthers))
        .run(&catalog)
        .await
        .unwrap();

    assert_eq!(report.plan.len(), 2);
    assert_eq!(report.plan.wave_of("synthesis"), Some(1));
    let calls: Vec<String> = runner.calls().into_iter().map(|(id, _)| id).collect();
    assert_eq!(calls.last().map(String::as_str), Some("synthesis"));
    assert!(report.results.iter().all(|r| r.status == TaskStatus::Succeeded));
}

#[tokio::test(start_paused = true)]
async fn timeout_marks_task_and_cancels_execution() {
    let catalog = TaskCatalog::new(vec![
        task("slow", 1, &[]).with_timeout(Duration::from_secs(5)).with_retry_budget(0),
        task("fast", 1, &[]),
    ]);
    let runner = Arc::new(ScriptedRunner::new().script("slow", vec![Step::Hang]));

    let start = Instant::now();
    let report = engine(runner, opts(FailureRecoveryPolicy::ContinueOthers))
        .run(&catalog)
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(6));
    let slow = report.results.iter().find(|r| r.task_id == "slow").unwrap();
    assert_eq!(slow.status, TaskStatus::TimedOut);
    assert_eq!(report.status, RunStatus::CompletedWithFailures);
}

#[tokio::test(start_paused = true)]
async fn cycle_fails_before_any_dispatch() {
    let catalog = TaskCatalog::new(vec![task("a", 1, &["b"]), task("b", 1, &["a"])]);
    let runner = Arc::new(ScriptedRunner::new());

    let err = engine(runner.clone(), opts(FailureRecoveryPolicy::RetryFailed))
        .run(&catalog)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::CircularDependency { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn conflicting_claims_surface_as_action_items() {
    let catalog = TaskCatalog::new(vec![task("a", 1, &[]), task("b", 1, &[])]);
    let runner = Arc::new(
        ScriptedRunner::new()
            .script(
                "a",
                vec![Step::Succeed(Duration::from_secs(1), TaskOutput::with_summary("a").claim("auth", "oauth2"))],
            )
            .script(
                "b",
                vec![Step::Succeed(Duration::from_secs(1), TaskOutput::with_summary("b").claim("auth", "basic"))],
            ),
    );

    let report = engine(runner, opts(FailureRecoveryPolicy::RetryFailed))
        .run(&catalog)
        .await
        .unwrap();

    assert_eq!(report.waves[0].conflicts.len(), 1);
    assert_eq!(report.unresolved_conflicts.len(), 1);
    assert_eq!(report.unresolved_conflicts[0].claim, "auth");
    assert!(report
        .action_items
        .iter()
        .any(|item| item.subject == "auth"));
}

#[tokio::test(start_paused = true)]
async fn external_cancellation_yields_partial_report() {
    use parawave_core::executor::ExecutionEngine;
    use tokio_util::sync::CancellationToken;

    let catalog = TaskCatalog::new(vec![task("a", 1, &[]), task("b", 1, &["a"])]);
    let runner = Arc::new(ScriptedRunner::new().script("a", vec![Step::Hang]));
    let token = CancellationToken::new();
    let engine = ExecutionEngine::builder(opts(FailureRecoveryPolicy::RetryFailed))
        .with_runner(runner)
        .with_synthesis(Arc::new(common::PassThrough))
        .with_cancellation(token.clone())
        .build()
        .unwrap();

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        token.cancel();
    });
    let report = engine.run(&catalog).await.unwrap();
    cancel.await.unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.partial);
    assert!(report.results.iter().all(|r| r.status == TaskStatus::Cancelled));
    let b = report.results.iter().find(|r| r.task_id == "b").unwrap();
    assert_eq!(b.attempt, 0);
}
