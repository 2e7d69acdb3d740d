use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::catalog::TaskSpec;
use crate::error::TaskError;

use super::output::EventBus;
use super::traits::{RenderEvent, TaskContext, TaskRunner};
use super::types::{TaskOutput, TaskResult, WaveResults};

/// One task attempt queued for a wave.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task: TaskSpec,
    pub attempt: u32,
    pub upstream: BTreeMap<String, TaskOutput>,
}

/// Per-wave dispatch settings.
#[derive(Debug, Clone)]
pub struct WaveOptions {
    pub run_id: String,
    pub wave: usize,
    pub max_concurrency: usize,
    pub default_timeout: Duration,
    /// Cancel running and queued siblings on the first failed or timed out task.
    pub cancel_on_failure: bool,
}

/// Execute every request of a wave concurrently and wait for all of them.
///
/// Each task is spawned onto the runtime and waits for a semaphore permit
/// before calling the runner. The call is bounded by the task's timeout and by
/// the wave's cancellation token, a child of `cancel`. Every request yields
/// exactly one terminal `TaskResult`, panics included.
pub async fn run_wave(
    requests: Vec<TaskRequest>,
    runner: Arc<dyn TaskRunner>,
    opts: &WaveOptions,
    cancel: &CancellationToken,
    events: &EventBus,
) -> WaveResults {
    let sem = Arc::new(Semaphore::new(opts.max_concurrency.max(1)));
    let wave_token = cancel.child_token();
    let mut futs = FuturesUnordered::new();

    for req in requests {
        let task = req.task.clone();
        let attempt = req.attempt;
        let started_at = Utc::now();
        let handle = tokio::spawn(dispatch(
            req,
            runner.clone(),
            sem.clone(),
            wave_token.clone(),
            events.clone(),
            opts.clone(),
        ));
        futs.push(async move { (task, attempt, started_at, handle.await) });
    }

    let mut results = WaveResults::new();
    while let Some((task, attempt, started_at, joined)) = futs.next().await {
        let result = match joined {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(task_id = %task.id, error = %err, "task panicked");
                if opts.cancel_on_failure {
                    wave_token.cancel();
                }
                TaskResult::from_outcome(
                    &task,
                    attempt,
                    started_at,
                    Duration::ZERO,
                    Err(TaskError::execution(format!("task panicked: {err}"))),
                )
            }
        };
        events.emit(RenderEvent::TaskComplete {
            run_id: opts.run_id.clone(),
            wave: opts.wave,
            result: result.clone(),
        });
        results.insert(result.task_id.clone(), result);
    }

    results
}

async fn dispatch(
    req: TaskRequest,
    runner: Arc<dyn TaskRunner>,
    sem: Arc<Semaphore>,
    wave_token: CancellationToken,
    events: EventBus,
    opts: WaveOptions,
) -> TaskResult {
    let permit = tokio::select! {
        biased;
        _ = wave_token.cancelled() => None,
        permit = sem.acquire_owned() => permit.ok(),
    };
    let Some(_permit) = permit else {
        return TaskResult::not_dispatched(&req.task, "cancelled before start");
    };
    if wave_token.is_cancelled() {
        return TaskResult::not_dispatched(&req.task, "cancelled before start");
    }

    events.emit(RenderEvent::TaskStart {
        run_id: opts.run_id.clone(),
        task_id: req.task.id.clone(),
        wave: opts.wave,
        attempt: req.attempt,
    });

    let timeout = req.task.effective_timeout(opts.default_timeout);
    let task_token = wave_token.child_token();
    let ctx = TaskContext {
        run_id: opts.run_id.clone(),
        wave: opts.wave,
        attempt: req.attempt,
        upstream: req.upstream,
        cancel: task_token.clone(),
    };

    let started_at = Utc::now();
    let start = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = wave_token.cancelled() => Err(TaskError::cancelled("wave cancelled")),
        res = tokio::time::timeout(timeout, runner.execute(&req.task, &ctx)) => match res {
            Ok(outcome) => outcome,
            Err(_) => {
                task_token.cancel();
                Err(TaskError::Timeout(timeout))
            }
        },
    };

    let result = TaskResult::from_outcome(&req.task, req.attempt, started_at, start.elapsed(), outcome);
    if opts.cancel_on_failure && result.status.is_failure() {
        tracing::warn!(task_id = %result.task_id, status = %result.status, "cancelling wave siblings");
        wave_token.cancel();
    }
    result
}
