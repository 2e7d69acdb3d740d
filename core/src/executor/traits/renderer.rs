use serde::Serialize;

use crate::executor::types::TaskResult;

/// Lifecycle event sink (text lines, JSONL, progress bars, ...).
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }
    fn render(&self, event: &RenderEvent);
}

/// Condensed outcome carried by `RenderEvent::RunEnd`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub status: String,
    pub partial: bool,
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub duration_ms: u64,
    pub speedup_ratio: f64,
    pub review_required: bool,
}

#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        total_tasks: usize,
        total_waves: usize,
    },
    Plan {
        run_id: String,
        waves: Vec<Vec<String>>,
    },
    WaveStart {
        run_id: String,
        wave: usize,
        task_ids: Vec<String>,
    },
    TaskStart {
        run_id: String,
        task_id: String,
        wave: usize,
        attempt: u32,
    },
    TaskComplete {
        run_id: String,
        wave: usize,
        result: TaskResult,
    },
    Retry {
        run_id: String,
        task_id: String,
        next_attempt: u32,
        delay_ms: u64,
    },
    Recovery {
        run_id: String,
        wave: usize,
        action: String,
        task_ids: Vec<String>,
    },
    WaveEnd {
        run_id: String,
        wave: usize,
        succeeded: usize,
        failed: usize,
        conflicts: usize,
    },
    RunEnd {
        run_id: String,
        summary: RunSummary,
    },
}

impl RenderEvent {
    pub fn run_id(&self) -> &str {
        match self {
            Self::RunStart { run_id, .. }
            | Self::Plan { run_id, .. }
            | Self::WaveStart { run_id, .. }
            | Self::TaskStart { run_id, .. }
            | Self::TaskComplete { run_id, .. }
            | Self::Retry { run_id, .. }
            | Self::Recovery { run_id, .. }
            | Self::WaveEnd { run_id, .. }
            | Self::RunEnd { run_id, .. } => run_id,
        }
    }

    /// Dotted event name, e.g. `wave.start`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run.start",
            Self::Plan { .. } => "executor.plan",
            Self::WaveStart { .. } => "wave.start",
            Self::TaskStart { .. } => "task.start",
            Self::TaskComplete { .. } => "task.end",
            Self::Retry { .. } => "task.retry",
            Self::Recovery { .. } => "wave.recovery",
            Self::WaveEnd { .. } => "wave.end",
            Self::RunEnd { .. } => "run.end",
        }
    }
}
