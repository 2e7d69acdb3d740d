//! Synthesis strategy interface and its result model.
//!
//! Concrete strategies live in the plugins crate and are selected by name.

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictRecord, ConflictStatus};
use crate::executor::types::TaskResult;

/// Reason attached to conflicts a strategy leaves for a human.
pub const NOT_RECONCILED: &str = "strategy does not reconcile claims";

/// A succeeded output that took part in synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludedOutput {
    pub task_id: String,
    pub domain: String,
    pub summary: String,
}

/// A ranked entry in the merged result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedItem {
    /// 1-based position.
    pub rank: usize,
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    /// Task ids that contributed this item.
    pub sources: Vec<String>,
    /// Strategy-specific score (risk, value per effort, votes, ...).
    pub score: f64,
}

/// Pairwise cross-validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCheck {
    pub left: String,
    pub right: String,
    pub constraints_checked: usize,
    pub violations: usize,
}

impl PairCheck {
    pub fn is_consistent(&self) -> bool {
        self.violations == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub strategy: String,
    pub included: Vec<IncludedOutput>,
    pub resolved: Vec<ConflictRecord>,
    pub escalated: Vec<ConflictRecord>,
    #[serde(default)]
    pub items: Vec<MergedItem>,
    #[serde(default)]
    pub cross_checks: Vec<PairCheck>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl SynthesisResult {
    pub fn new(strategy: impl Into<String>, results: &[TaskResult]) -> Self {
        Self {
            strategy: strategy.into(),
            included: included_outputs(results),
            resolved: Vec::new(),
            escalated: Vec::new(),
            items: Vec::new(),
            cross_checks: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Route a conflict into `resolved` or `escalated` by its status.
    /// Anything still unresolved is escalated.
    pub fn push_conflict(&mut self, conflict: ConflictRecord) {
        match conflict.status {
            ConflictStatus::AutoResolved => self.resolved.push(conflict),
            ConflictStatus::Escalated => self.escalated.push(conflict),
            ConflictStatus::Unresolved => self.escalated.push(conflict.escalate(NOT_RECONCILED)),
        }
    }

    /// Conflicts a human must look at.
    pub fn unresolved(&self) -> &[ConflictRecord] {
        &self.escalated
    }
}

/// A named, deterministic merge function.
pub trait SynthesisStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Identical inputs must produce identical results.
    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult;
}

/// Succeeded results only, in the order given.
pub fn succeeded(results: &[TaskResult]) -> Vec<&TaskResult> {
    results.iter().filter(|r| r.is_success() && r.output.is_some()).collect()
}

fn included_outputs(results: &[TaskResult]) -> Vec<IncludedOutput> {
    succeeded(results)
        .into_iter()
        .map(|r| IncludedOutput {
            task_id: r.task_id.clone(),
            domain: r.domain.clone(),
            summary: r.output.as_ref().map(|o| o.summary.clone()).unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TaskSpec;
    use crate::conflict::ClaimFragment;
    use crate::error::TaskError;
    use crate::executor::types::TaskOutput;
    use chrono::Utc;
    use std::time::Duration;

    fn fragment(id: &str) -> ClaimFragment {
        ClaimFragment {
            task_id: id.into(),
            domain: "general".into(),
            content: id.into(),
        }
    }

    #[test]
    fn test_unresolved_conflicts_are_escalated_on_push() {
        let mut result = SynthesisResult::new("x", &[]);
        result.push_conflict(ConflictRecord::new("auth", fragment("a"), fragment("b")));
        result.push_conflict(ConflictRecord::new("db", fragment("a"), fragment("b")).auto_resolve("a", "ok"));

        assert_eq!(result.resolved.len(), 1);
        assert_eq!(result.unresolved().len(), 1);
        assert_eq!(result.escalated[0].reason.as_deref(), Some(NOT_RECONCILED));
    }

    #[test]
    fn test_only_succeeded_outputs_are_included() {
        let ok = TaskResult::from_outcome(
            &TaskSpec::new("a", "").with_domain("security"),
            1,
            Utc::now(),
            Duration::ZERO,
            Ok(TaskOutput::with_summary("fine")),
        );
        let failed = TaskResult::from_outcome(
            &TaskSpec::new("b", ""),
            1,
            Utc::now(),
            Duration::ZERO,
            Err(TaskError::execution("boom")),
        );
        let result = SynthesisResult::new("x", &[ok, failed]);
        assert_eq!(
            result.included,
            vec![IncludedOutput {
                task_id: "a".into(),
                domain: "security".into(),
                summary: "fine".into(),
            }]
        );
    }
}
