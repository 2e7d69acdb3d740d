use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parawave_core::catalog::TaskSpec;
use parawave_core::error::TaskError;
use parawave_core::executor::traits::{TaskContext, TaskRunner};
use parawave_core::executor::types::TaskOutput;
use serde::Deserialize;

/// One recorded attempt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayStep {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub output: Option<TaskOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A single step for every attempt, or one step per attempt (the last repeats).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReplayScript {
    PerAttempt(Vec<ReplayStep>),
    Single(ReplayStep),
}

impl ReplayScript {
    fn step(&self, attempt: u32) -> Option<&ReplayStep> {
        match self {
            Self::Single(step) => Some(step),
            Self::PerAttempt(steps) => {
                let i = (attempt as usize).saturating_sub(1).min(steps.len().saturating_sub(1));
                steps.get(i)
            }
        }
    }
}

/// Serves pre-recorded task outputs keyed by task id.
///
/// Used to re-run synthesis offline and to demo the engine without a backend.
pub struct ReplayRunnerPlugin {
    scripts: BTreeMap<String, ReplayScript>,
}

impl ReplayRunnerPlugin {
    pub fn new(scripts: BTreeMap<String, ReplayScript>) -> Self {
        Self { scripts }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let scripts = serde_json::from_str(s).context("invalid replay outputs document")?;
        Ok(Self::new(scripts))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay outputs {}", path.display()))?;
        Self::from_json_str(&content)
    }
}

#[async_trait]
impl TaskRunner for ReplayRunnerPlugin {
    fn name(&self) -> &str {
        "replay"
    }

    async fn execute(&self, task: &TaskSpec, ctx: &TaskContext) -> Result<TaskOutput, TaskError> {
        let step = self
            .scripts
            .get(&task.id)
            .and_then(|script| script.step(ctx.attempt))
            .cloned()
            .ok_or_else(|| TaskError::execution(format!("no recorded output for task '{}'", task.id)))?;

        if step.delay_ms > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(step.delay_ms)) => {}
                _ = ctx.cancel.cancelled() => return Err(TaskError::cancelled("replay interrupted")),
            }
        }

        match step.error {
            Some(err) => Err(TaskError::Execution(err)),
            None => Ok(step.output.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn ctx(attempt: u32) -> TaskContext {
        TaskContext {
            run_id: "run".into(),
            wave: 0,
            attempt,
            upstream: BTreeMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    const RECORDED: &str = r#"{
        "security": {"delay_ms": 1000, "output": {"summary": "two risks"}},
        "flaky": [{"error": "rate limited"}, {"output": {"summary": "second time lucky"}}]
    }"#;

    #[tokio::test(start_paused = true)]
    async fn test_replay_single_step() {
        let runner = ReplayRunnerPlugin::from_json_str(RECORDED).unwrap();
        let out = runner.execute(&TaskSpec::new("security", ""), &ctx(1)).await.unwrap();
        assert_eq!(out.summary, "two risks");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_per_attempt_steps() {
        let runner = ReplayRunnerPlugin::from_json_str(RECORDED).unwrap();
        let task = TaskSpec::new("flaky", "");
        let first = runner.execute(&task, &ctx(1)).await.unwrap_err();
        assert_eq!(first, TaskError::Execution("rate limited".into()));
        let second = runner.execute(&task, &ctx(2)).await.unwrap();
        assert_eq!(second.summary, "second time lucky");
        assert!(runner.execute(&task, &ctx(5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_replay_unknown_task_fails() {
        let runner = ReplayRunnerPlugin::from_json_str("{}").unwrap();
        let err = runner.execute(&TaskSpec::new("ghost", ""), &ctx(1)).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
