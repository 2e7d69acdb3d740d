//! Claim conflict detection between task outputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::executor::types::TaskResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Unresolved,
    AutoResolved,
    Escalated,
}

impl ConflictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::AutoResolved => "auto_resolved",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a conflict: what a task said about the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFragment {
    pub task_id: String,
    pub domain: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub claim: String,
    pub left: ClaimFragment,
    pub right: ClaimFragment,
    pub status: ConflictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConflictRecord {
    pub fn new(claim: impl Into<String>, left: ClaimFragment, right: ClaimFragment) -> Self {
        Self {
            claim: claim.into(),
            left,
            right,
            status: ConflictStatus::Unresolved,
            resolution: None,
            reason: None,
        }
    }

    pub fn auto_resolve(mut self, resolution: impl Into<String>, reason: impl Into<String>) -> Self {
        self.status = ConflictStatus::AutoResolved;
        self.resolution = Some(resolution.into());
        self.reason = Some(reason.into());
        self
    }

    pub fn escalate(mut self, reason: impl Into<String>) -> Self {
        self.status = ConflictStatus::Escalated;
        self.resolution = None;
        self.reason = Some(reason.into());
        self
    }

    pub fn involves(&self, task_id: &str) -> bool {
        self.left.task_id == task_id || self.right.task_id == task_id
    }

    pub fn needs_attention(&self) -> bool {
        self.status != ConflictStatus::AutoResolved
    }
}

/// Compare every pair of succeeded outputs for claims with differing content.
///
/// `results` is taken in scope order; records come out ordered by the first
/// task, then the second, then the claim key. Content is compared after
/// trimming surrounding whitespace.
pub fn detect(results: &[TaskResult]) -> Vec<ConflictRecord> {
    let outputs: Vec<_> = results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| r.output.as_ref().map(|o| (r, o)))
        .collect();

    let mut conflicts = Vec::new();
    for (i, (left, left_out)) in outputs.iter().enumerate() {
        for (right, right_out) in outputs.iter().skip(i + 1) {
            for (claim, left_content) in &left_out.claims {
                let Some(right_content) = right_out.claims.get(claim) else {
                    continue;
                };
                if left_content.trim() == right_content.trim() {
                    continue;
                }
                conflicts.push(ConflictRecord::new(
                    claim.clone(),
                    ClaimFragment {
                        task_id: left.task_id.clone(),
                        domain: left.domain.clone(),
                        content: left_content.clone(),
                    },
                    ClaimFragment {
                        task_id: right.task_id.clone(),
                        domain: right.domain.clone(),
                        content: right_content.clone(),
                    },
                ));
            }
        }
    }

    if !conflicts.is_empty() {
        tracing::debug!(count = conflicts.len(), "claim conflicts detected");
    }
    conflicts
}
