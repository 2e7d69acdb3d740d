#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parawave_core::catalog::TaskSpec;
use parawave_core::conflict::ConflictRecord;
use parawave_core::config::FailureRecoveryPolicy;
use parawave_core::error::TaskError;
use parawave_core::executor::types::{TaskOutput, TaskResult};
use parawave_core::executor::{ExecutionEngine, ExecutionOpts, TaskContext, TaskRunner};
use parawave_core::synthesis::{SynthesisResult, SynthesisStrategy};

/// What a scripted task does on one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(Duration, TaskOutput),
    Fail(Duration),
    /// Never finishes on its own; only timeout or cancellation ends it.
    Hang,
}

pub fn ok(secs: u64) -> Step {
    Step::Succeed(Duration::from_secs(secs), TaskOutput::with_summary("done"))
}

pub fn fail(secs: u64) -> Step {
    Step::Fail(Duration::from_secs(secs))
}

/// Runner that replays a per-task list of steps, one per attempt.
/// The last step repeats once the list is exhausted.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Vec<Step>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, task_id: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(task_id.to_string(), steps);
        self
    }

    /// (task id, attempt) in call order.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, task_id: &str) -> usize {
        self.calls().iter().filter(|(id, _)| id == task_id).count()
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, task: &TaskSpec, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
        self.calls.lock().unwrap().push((task.id.clone(), ctx.attempt));
        let step = self
            .scripts
            .get(&task.id)
            .and_then(|steps| {
                let i = (ctx.attempt as usize).saturating_sub(1).min(steps.len().saturating_sub(1));
                steps.get(i).cloned()
            })
            .unwrap_or_else(|| ok(1));

        match step {
            Step::Succeed(d, output) => {
                tokio::time::sleep(d).await;
                Ok(output)
            }
            Step::Fail(d) => {
                tokio::time::sleep(d).await;
                Err(TaskError::execution(format!("{} failed on attempt {}", task.id, ctx.attempt)))
            }
            Step::Hang => {
                ctx.cancel.cancelled().await;
                Err(TaskError::cancelled("runner observed cancellation"))
            }
        }
    }
}

/// Includes every succeeded output and escalates every conflict.
pub struct PassThrough;

impl SynthesisStrategy for PassThrough {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult {
        let mut out = SynthesisResult::new(self.name(), results);
        for c in conflicts {
            out.push_conflict(c.clone());
        }
        out
    }
}

pub fn opts(policy: FailureRecoveryPolicy) -> ExecutionOpts {
    ExecutionOpts::default().with_policy(policy)
}

pub fn engine(runner: Arc<ScriptedRunner>, opts: ExecutionOpts) -> ExecutionEngine {
    ExecutionEngine::builder(opts)
        .with_runner(runner)
        .with_synthesis(Arc::new(PassThrough))
        .build()
        .expect("engine builds")
}

pub fn task(id: &str, secs: u64, deps: &[&str]) -> TaskSpec {
    TaskSpec::new(id, format!("{id} analysis"))
        .with_estimate(Duration::from_secs(secs))
        .depends_on(deps.iter().copied())
}
