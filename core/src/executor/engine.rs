use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::{TaskCatalog, TaskSpec};
use crate::config::{FailureRecoveryPolicy, OptimizationLevel, MAX_CONCURRENT_AGENTS, MIN_CONCURRENT_AGENTS};
use crate::conflict;
use crate::error::ExecutorError;
use crate::report::{self, PerformanceRecord, RunReport, RunStatus, WaveReport};
use crate::synthesis::SynthesisStrategy;

use super::graph::TaskGraph;
use super::output::EventBus;
use super::recovery::{RecoveryAction, RecoveryController};
use super::scheduler::{run_wave, TaskRequest, WaveOptions};
use super::traits::{OutputRendererPlugin, RenderEvent, RetryStrategyPlugin, TaskRunner};
use super::types::{ExecutionOpts, ExecutionPlan, TaskResult, WaveResults};

/// Validate a catalog and layer it into waves without running anything.
pub fn build_plan(catalog: &TaskCatalog) -> Result<ExecutionPlan, ExecutorError> {
    catalog.validate()?;
    TaskGraph::from_tasks(catalog.tasks())?.build_plan()
}

/// Runs a catalog wave by wave: dispatch, recover, detect conflicts,
/// synthesize, record.
pub struct ExecutionEngine {
    opts: ExecutionOpts,
    runner: Arc<dyn TaskRunner>,
    synthesis: Arc<dyn SynthesisStrategy>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    events: EventBus,
    cancel: CancellationToken,
}

pub struct ExecutionEngineBuilder {
    opts: ExecutionOpts,
    runner: Option<Arc<dyn TaskRunner>>,
    synthesis: Option<Arc<dyn SynthesisStrategy>>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    renderers: Vec<Arc<dyn OutputRendererPlugin>>,
    cancel: CancellationToken,
}

impl ExecutionEngineBuilder {
    pub fn new(opts: ExecutionOpts) -> Self {
        Self {
            opts,
            runner: None,
            synthesis: None,
            retry_strategy: None,
            renderers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_synthesis(mut self, strategy: Arc<dyn SynthesisStrategy>) -> Self {
        self.synthesis = Some(strategy);
        self
    }

    pub fn with_retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderers.push(renderer);
        self
    }

    /// Token that cancels the whole run from outside (e.g. Ctrl-C).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> Result<ExecutionEngine, ExecutorError> {
        if !(MIN_CONCURRENT_AGENTS..=MAX_CONCURRENT_AGENTS).contains(&self.opts.max_concurrency) {
            return Err(ExecutorError::InvalidConfig(format!(
                "max_concurrency must be within {}..={}, got {}",
                MIN_CONCURRENT_AGENTS, MAX_CONCURRENT_AGENTS, self.opts.max_concurrency
            )));
        }
        let runner = self
            .runner
            .ok_or_else(|| ExecutorError::InvalidConfig("no task runner configured".to_string()))?;
        let synthesis = self
            .synthesis
            .ok_or_else(|| ExecutorError::UnknownStrategy(self.opts.synthesis_strategy.clone()))?;

        Ok(ExecutionEngine {
            opts: self.opts,
            runner,
            synthesis,
            retry_strategy: self.retry_strategy,
            events: EventBus::new(self.renderers),
            cancel: self.cancel,
        })
    }
}

/// Outcome of one wave, folded into the run.
struct WaveOutcome {
    report: WaveReport,
    aborted: bool,
    cancelled: bool,
}

impl ExecutionEngine {
    pub fn builder(opts: ExecutionOpts) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(opts)
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    /// Execute the catalog and build its report.
    ///
    /// Plan errors (duplicate ids, unknown dependencies, cycles) are returned
    /// before any task is dispatched. Everything after that yields a report,
    /// partial when the plan was aborted or cancelled.
    pub async fn run(&self, catalog: &TaskCatalog) -> Result<RunReport, ExecutorError> {
        let run_id = Uuid::new_v4().to_string();

        let graph = catalog
            .validate()
            .and_then(|_| TaskGraph::from_tasks(catalog.tasks()))
            .map_err(|e| {
                tracing::error!(run_id = %run_id, error = %e, "catalog rejected");
                e
            })?;
        let plan = graph.build_plan().map_err(|e| {
            tracing::error!(run_id = %run_id, error = %e, "plan construction failed");
            e
        })?;

        tracing::info!(
            run_id = %run_id,
            tasks = plan.total_tasks(),
            waves = plan.len(),
            policy = %self.opts.failure_recovery,
            strategy = self.synthesis.name(),
            runner = self.runner.name(),
            "starting run"
        );

        let started_at = Utc::now();
        let start = Instant::now();
        self.events.emit(RenderEvent::RunStart {
            run_id: run_id.clone(),
            total_tasks: plan.total_tasks(),
            total_waves: plan.len(),
        });
        self.events.emit(RenderEvent::Plan {
            run_id: run_id.clone(),
            waves: plan.stages(),
        });

        let controller = RecoveryController::new(self.opts.failure_recovery);
        let mut finals: HashMap<String, TaskResult> = HashMap::new();
        let mut attempts: Vec<TaskResult> = Vec::new();
        let mut waves: Vec<WaveReport> = Vec::new();
        let mut aborted = false;
        let mut cancelled = false;

        for wave in &plan.waves {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let outcome = self
                .run_single_wave(&run_id, wave.index, &wave.task_ids, &graph, catalog, &controller, &mut finals, &mut attempts)
                .await;
            aborted = outcome.aborted;
            cancelled = outcome.cancelled;
            waves.push(outcome.report);
            if aborted || cancelled {
                break;
            }
        }

        // Every task ends with a terminal result, including those never reached.
        let reason = if cancelled { "run cancelled" } else { "plan aborted" };
        for id in plan.task_ids() {
            if finals.contains_key(id) {
                continue;
            }
            if let Some(task) = graph.nodes.get(id) {
                let result = TaskResult::not_dispatched(task, reason);
                self.events.emit(RenderEvent::TaskComplete {
                    run_id: run_id.clone(),
                    wave: plan.wave_of(id).unwrap_or_default(),
                    result: result.clone(),
                });
                attempts.push(result.clone());
                finals.insert(id.to_string(), result);
            }
        }

        let results: Vec<TaskResult> = plan
            .task_ids()
            .filter_map(|id| finals.get(id).cloned())
            .collect();
        let conflicts = conflict::detect(&results);
        let synthesis = self.synthesis.synthesize(&results, &conflicts);

        let actual = start.elapsed();
        let performance = PerformanceRecord::record(
            &graph,
            &plan,
            actual,
            self.opts.declared_baseline,
            self.opts.minimum_speedup_ratio,
        )?;
        let quality = report::score(&results, &self.opts.rubric);
        let unresolved = synthesis.unresolved().to_vec();
        let action_items = report::action_items(&results, &unresolved, &quality, &performance);

        let status = if cancelled {
            RunStatus::Cancelled
        } else if aborted {
            RunStatus::Aborted
        } else if results.iter().all(TaskResult::is_success) {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures
        };

        let report = RunReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            status,
            partial: aborted || cancelled,
            policy: self.opts.failure_recovery,
            plan,
            results,
            attempts,
            waves,
            synthesis,
            review_required: quality.review_required,
            performance,
            quality,
            unresolved_conflicts: unresolved,
            action_items,
        };

        self.events.emit(RenderEvent::RunEnd {
            run_id,
            summary: report.summary(),
        });

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_single_wave(
        &self,
        run_id: &str,
        index: usize,
        task_ids: &[String],
        graph: &TaskGraph<TaskSpec>,
        catalog: &TaskCatalog,
        controller: &RecoveryController,
        finals: &mut HashMap<String, TaskResult>,
        attempts: &mut Vec<TaskResult>,
    ) -> WaveOutcome {
        let wave_start = Instant::now();
        self.events.emit(RenderEvent::WaveStart {
            run_id: run_id.to_string(),
            wave: index,
            task_ids: task_ids.to_vec(),
        });

        let mut wave_results = WaveResults::new();
        let mut requests: BTreeMap<String, TaskRequest> = BTreeMap::new();
        let mut blocked = Vec::new();

        for id in task_ids {
            let Some(task) = graph.nodes.get(id) else {
                continue;
            };
            let failed_dep = task
                .dependencies
                .iter()
                .find(|d| !finals.get(d.as_str()).map(TaskResult::is_success).unwrap_or(false));
            if let Some(dep) = failed_dep {
                let result = TaskResult::not_dispatched(task, format!("upstream failure: {dep}"));
                self.events.emit(RenderEvent::TaskComplete {
                    run_id: run_id.to_string(),
                    wave: index,
                    result: result.clone(),
                });
                attempts.push(result.clone());
                wave_results.insert(id.clone(), result);
                blocked.push(id.clone());
                continue;
            }

            let upstream = task
                .dependencies
                .iter()
                .filter_map(|d| {
                    finals
                        .get(d)
                        .and_then(|r| r.output.clone())
                        .map(|o| (d.clone(), o))
                })
                .collect();
            requests.insert(
                id.clone(),
                TaskRequest {
                    task: task.clone(),
                    attempt: 1,
                    upstream,
                },
            );
        }

        if !blocked.is_empty() {
            tracing::warn!(run_id, wave = index, tasks = %blocked.join(","), "dependents of failed tasks cancelled");
            self.events.emit(RenderEvent::Recovery {
                run_id: run_id.to_string(),
                wave: index,
                action: "cancel_dependents".to_string(),
                task_ids: blocked,
            });
        }

        let wave_opts = WaveOptions {
            run_id: run_id.to_string(),
            wave: index,
            max_concurrency: self.opts.max_concurrency,
            default_timeout: self.opts.default_timeout,
            cancel_on_failure: self.opts.failure_recovery == FailureRecoveryPolicy::AbortAll,
        };

        let mut pending: Vec<TaskRequest> = task_ids
            .iter()
            .filter_map(|id| requests.get(id).cloned())
            .collect();
        let mut retries = 0u32;
        let mut aborted = false;
        let mut cancelled = false;

        while !pending.is_empty() {
            let round = run_wave(pending, self.runner.clone(), &wave_opts, &self.cancel, &self.events).await;
            attempts.extend(round.values().cloned());
            wave_results.extend(round);
            pending = Vec::new();

            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let action = controller.decide(&wave_results, catalog);
            match &action {
                RecoveryAction::Proceed => {}
                RecoveryAction::Abort { failed } => {
                    tracing::warn!(run_id, wave = index, failed = %failed.join(","), "aborting plan");
                    self.emit_recovery(run_id, index, &action, failed);
                    aborted = true;
                }
                RecoveryAction::Retry(ids) => {
                    self.emit_recovery(run_id, index, &action, ids);
                    let mut delay = Duration::ZERO;
                    for id in ids {
                        let (Some(prev), Some(req)) = (wave_results.get(id), requests.get(id)) else {
                            continue;
                        };
                        let next_delay = self.backoff(prev.attempt);
                        delay = delay.max(next_delay);
                        tracing::warn!(
                            run_id,
                            task_id = %id,
                            attempt = prev.attempt,
                            delay_ms = next_delay.as_millis() as u64,
                            "task failed, scheduling retry"
                        );
                        self.events.emit(RenderEvent::Retry {
                            run_id: run_id.to_string(),
                            task_id: id.clone(),
                            next_attempt: prev.attempt + 1,
                            delay_ms: next_delay.as_millis() as u64,
                        });
                        pending.push(TaskRequest {
                            attempt: prev.attempt + 1,
                            ..req.clone()
                        });
                    }
                    retries += pending.len() as u32;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            cancelled = true;
                            break;
                        }
                    }
                }
            }
        }

        finals.extend(wave_results.iter().map(|(k, v)| (k.clone(), v.clone())));

        let ordered: Vec<TaskResult> = task_ids
            .iter()
            .filter_map(|id| wave_results.get(id).cloned())
            .collect();
        let conflicts = conflict::detect(&ordered);
        let synthesis = self.synthesis.synthesize(&ordered, &conflicts);

        let succeeded = ordered.iter().filter(|r| r.is_success()).count();
        let failed = ordered.iter().filter(|r| r.status.is_failure()).count();
        tracing::info!(run_id, wave = index, succeeded, failed, conflicts = conflicts.len(), "wave finished");
        self.events.emit(RenderEvent::WaveEnd {
            run_id: run_id.to_string(),
            wave: index,
            succeeded,
            failed,
            conflicts: conflicts.len(),
        });

        WaveOutcome {
            report: WaveReport {
                index,
                task_ids: task_ids.to_vec(),
                results: ordered,
                conflicts,
                synthesis,
                retries,
                duration_ms: wave_start.elapsed().as_millis() as u64,
            },
            aborted,
            cancelled,
        }
    }

    fn emit_recovery(&self, run_id: &str, wave: usize, action: &RecoveryAction, ids: &[String]) {
        self.events.emit(RenderEvent::Recovery {
            run_id: run_id.to_string(),
            wave,
            action: action.to_string(),
            task_ids: ids.to_vec(),
        });
    }

    /// Delay before the attempt after `attempt`.
    fn backoff(&self, attempt: u32) -> Duration {
        match &self.retry_strategy {
            Some(strategy) => strategy.next_delay(attempt),
            None => default_backoff(self.opts.optimization_level, attempt),
        }
    }
}

/// Doubling from the level's base delay, capped at its maximum.
fn default_backoff(level: OptimizationLevel, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = level.base_backoff_ms().saturating_mul(1u64 << exp);
    Duration::from_millis(delay.min(level.max_backoff_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_doubles_until_cap() {
        let level = OptimizationLevel::Balanced;
        assert_eq!(default_backoff(level, 1), Duration::from_millis(1_000));
        assert_eq!(default_backoff(level, 2), Duration::from_millis(2_000));
        assert_eq!(default_backoff(level, 3), Duration::from_millis(4_000));
        assert_eq!(default_backoff(level, 10), Duration::from_millis(15_000));
    }

    #[test]
    fn test_build_plan_rejects_cycles() {
        let catalog = TaskCatalog::new(vec![
            TaskSpec::new("a", "").depends_on(["b"]),
            TaskSpec::new("b", "").depends_on(["a"]),
        ]);
        assert!(matches!(
            build_plan(&catalog),
            Err(ExecutorError::CircularDependency { .. })
        ));
    }
}
