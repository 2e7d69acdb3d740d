use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::TaskSpec;
use crate::error::TaskError;

/// Terminal status of one task execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Statuses the recovery controller reacts to.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits one output places on a claim made by any other output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub claim: String,
    pub allowed: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

impl Constraint {
    pub fn permits(&self, content: &str) -> bool {
        let content = content.trim();
        self.allowed.iter().any(|a| a.trim() == content)
    }
}

fn default_effort() -> f64 {
    1.0
}

/// A keyed, rankable item of analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub impact: f64,
    #[serde(default)]
    pub probability: f64,
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_effort")]
    pub effort: f64,
    /// Keys of findings (from any output) that must be addressed first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Finding {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            detail: String::new(),
            impact: 0.0,
            probability: 0.0,
            value: 0.0,
            effort: default_effort(),
            depends_on: Vec::new(),
        }
    }
}

/// Self-reported quality dimensions, each 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    #[serde(default)]
    pub completeness: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub testability: Option<f64>,
    #[serde(default)]
    pub clarity: Option<f64>,
}

/// Structured envelope a runner returns for a successful task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<QualityAssessment>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl TaskOutput {
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn claim(mut self, key: impl Into<String>, content: impl Into<String>) -> Self {
        self.claims.insert(key.into(), content.into());
        self
    }

    pub fn finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn has_content(&self) -> bool {
        !self.summary.trim().is_empty()
            || !self.claims.is_empty()
            || !self.findings.is_empty()
            || !self.payload.is_null()
    }
}

/// One task execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub domain: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 1-based; 0 means the task was never dispatched.
    pub attempt: u32,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn from_outcome(
        task: &TaskSpec,
        attempt: u32,
        started_at: DateTime<Utc>,
        duration: Duration,
        outcome: Result<TaskOutput, TaskError>,
    ) -> Self {
        let (status, output, error) = match outcome {
            Ok(output) => (TaskStatus::Succeeded, Some(output), None),
            Err(err) => {
                let status = match err {
                    TaskError::Timeout(_) => TaskStatus::TimedOut,
                    TaskError::Cancelled(_) => TaskStatus::Cancelled,
                    TaskError::Execution(_) => TaskStatus::Failed,
                };
                (status, None, Some(err.to_string()))
            }
        };
        Self {
            task_id: task.id.clone(),
            domain: task.domain.clone(),
            status,
            output,
            error,
            started_at,
            finished_at: Utc::now(),
            attempt,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// A task that never started: upstream failure or plan abort.
    pub fn not_dispatched(task: &TaskSpec, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task.id.clone(),
            domain: task.domain.clone(),
            status: TaskStatus::Cancelled,
            output: None,
            error: Some(reason.into()),
            started_at: now,
            finished_at: now,
            attempt: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Results of one wave keyed by task id; completion order is irrelevant.
pub type WaveResults = BTreeMap<String, TaskResult>;
