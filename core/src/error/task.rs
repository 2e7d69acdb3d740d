use std::time::Duration;

use thiserror::Error;

/// Per-task failure reported by a runner or by the dispatcher.
///
/// These are recoverable: the failure recovery controller decides what the
/// plan does about them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task execution failed: {0}")]
    Execution(String),

    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    #[error("task cancelled: {0}")]
    Cancelled(String),
}

impl TaskError {
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Execution(format!("{err:#}"))
    }
}
