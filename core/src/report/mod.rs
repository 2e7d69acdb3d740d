//! Run report: everything a finished (or aborted) run produced.

mod performance;
mod quality;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FailureRecoveryPolicy;
use crate::conflict::ConflictRecord;
use crate::error::ExecutorError;
use crate::executor::traits::RunSummary;
use crate::executor::types::{ExecutionPlan, TaskResult, TaskStatus};
use crate::synthesis::SynthesisResult;

pub use performance::{BaselineSource, PerformanceRecord};
pub use quality::{score, OutputScore, QualityScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task succeeded.
    Completed,
    /// All waves ran, but some tasks failed or were cancelled.
    CompletedWithFailures,
    /// `abort_all` stopped the plan.
    Aborted,
    /// Shut down from outside.
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletedWithFailures => "completed_with_failures",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-wave slice of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveReport {
    pub index: usize,
    pub task_ids: Vec<String>,
    /// Final result of each task in the wave, in wave order.
    pub results: Vec<TaskResult>,
    pub conflicts: Vec<ConflictRecord>,
    pub synthesis: SynthesisResult,
    pub retries: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FailedTask,
    EscalatedConflict,
    ReviewRequired,
    PerformanceMissed,
}

/// Entry requiring human attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub kind: ActionKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// True when some waves never ran.
    pub partial: bool,
    pub policy: FailureRecoveryPolicy,
    pub plan: ExecutionPlan,
    /// Final result per task, in plan order.
    pub results: Vec<TaskResult>,
    /// Every attempt, in the order they finished.
    pub attempts: Vec<TaskResult>,
    pub waves: Vec<WaveReport>,
    pub synthesis: SynthesisResult,
    pub performance: PerformanceRecord,
    pub quality: QualityScore,
    pub unresolved_conflicts: Vec<ConflictRecord>,
    pub action_items: Vec<ActionItem>,
    pub review_required: bool,
}

impl RunReport {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.partial && self.results.iter().all(TaskResult::is_success)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            status: self.status.to_string(),
            partial: self.partial,
            total_tasks: self.plan.total_tasks(),
            succeeded: self.count(TaskStatus::Succeeded),
            failed: self.count(TaskStatus::Failed) + self.count(TaskStatus::TimedOut),
            cancelled: self.count(TaskStatus::Cancelled),
            duration_ms: (self.performance.actual_secs * 1000.0).round() as u64,
            speedup_ratio: self.performance.speedup_ratio,
            review_required: self.review_required,
        }
    }
}

/// Derive the action items for a report, in a fixed order: failed tasks,
/// escalated conflicts, the review gate, then the performance target.
pub fn action_items(
    results: &[TaskResult],
    unresolved: &[ConflictRecord],
    quality: &QualityScore,
    performance: &PerformanceRecord,
) -> Vec<ActionItem> {
    let mut items = Vec::new();

    for r in results.iter().filter(|r| !r.is_success()) {
        items.push(ActionItem {
            kind: ActionKind::FailedTask,
            subject: r.task_id.clone(),
            detail: format!(
                "{} after attempt {}: {}",
                r.status,
                r.attempt,
                r.error.as_deref().unwrap_or("no detail")
            ),
        });
    }

    for c in unresolved {
        items.push(ActionItem {
            kind: ActionKind::EscalatedConflict,
            subject: c.claim.clone(),
            detail: format!(
                "{} says '{}', {} says '{}'{}",
                c.left.task_id,
                c.left.content.trim(),
                c.right.task_id,
                c.right.content.trim(),
                c.reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default()
            ),
        });
    }

    if quality.review_required {
        items.push(ActionItem {
            kind: ActionKind::ReviewRequired,
            subject: "quality".to_string(),
            detail: format!(
                "composite {:.1} is below the review threshold {:.1}",
                quality.composite, quality.threshold
            ),
        });
    }

    if !performance.passed {
        items.push(ActionItem {
            kind: ActionKind::PerformanceMissed,
            subject: "speedup".to_string(),
            detail: format!(
                "speedup {:.2}x is below the required {:.2}x",
                performance.speedup_ratio, performance.minimum_ratio
            ),
        });
    }

    items
}

/// Turns a finished report into a document (Markdown, JSON, ...).
pub trait ReportRenderer: Send + Sync {
    fn name(&self) -> &str;
    fn render(&self, report: &RunReport) -> Result<String, ExecutorError>;
}
