use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::catalog::TaskSpec;
use crate::error::TaskError;
use crate::executor::types::TaskOutput;

/// Per-attempt context handed to a runner.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub run_id: String,
    pub wave: usize,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Outputs of the task's direct dependencies, keyed by task id.
    pub upstream: BTreeMap<String, TaskOutput>,
    /// Fires on timeout, plan abort, or external shutdown.
    pub cancel: CancellationToken,
}

/// Execution backend for a single task attempt.
///
/// Implementations should watch `ctx.cancel` and stop promptly once it fires;
/// the dispatcher drops the future in any case.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, task: &TaskSpec, ctx: &TaskContext) -> Result<TaskOutput, TaskError>;
}
