//! Built-in synthesis strategies.
//!
//! Every strategy is a pure function of its inputs: outputs are visited in the
//! order given and ties keep first-seen order, so identical inputs always
//! produce identical results.

pub mod consensus;
pub mod integration;
pub mod risk;
pub mod sequence;
pub mod value_effort;

pub use consensus::ConsensusStrategy;
pub use integration::IntegrationMatrixStrategy;
pub use risk::RiskMatrixStrategy;
pub use sequence::DependencySequenceStrategy;
pub use value_effort::ValueEffortStrategy;

use parawave_core::conflict::{ClaimFragment, ConflictRecord};
use parawave_core::executor::types::{Finding, TaskResult};
use parawave_core::synthesis::{succeeded, MergedItem, SynthesisResult, NOT_RECONCILED};

/// A finding plus every task that reported its key.
#[derive(Debug, Clone)]
pub(crate) struct SourcedFinding {
    pub finding: Finding,
    pub sources: Vec<String>,
}

/// Findings from succeeded outputs merged by key. The first report of a key
/// supplies its fields; later reports only add a source.
pub(crate) fn collect_findings(results: &[TaskResult]) -> Vec<SourcedFinding> {
    let mut merged: Vec<SourcedFinding> = Vec::new();
    for result in succeeded(results) {
        let Some(output) = result.output.as_ref() else {
            continue;
        };
        for finding in &output.findings {
            match merged.iter_mut().find(|m| m.finding.key == finding.key) {
                Some(existing) => {
                    if !existing.sources.contains(&result.task_id) {
                        existing.sources.push(result.task_id.clone());
                    }
                }
                None => merged.push(SourcedFinding {
                    finding: finding.clone(),
                    sources: vec![result.task_id.clone()],
                }),
            }
        }
    }
    merged
}

/// Sort by score, highest first. The sort is stable so equal scores keep
/// first-seen order.
pub(crate) fn rank_descending(mut scored: Vec<(SourcedFinding, f64)>) -> Vec<MergedItem> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .enumerate()
        .map(|(i, (sourced, score))| to_item(i + 1, sourced, score))
        .collect()
}

pub(crate) fn to_item(rank: usize, sourced: SourcedFinding, score: f64) -> MergedItem {
    let SourcedFinding { finding, sources } = sourced;
    let title = if finding.title.is_empty() { finding.key.clone() } else { finding.title };
    MergedItem {
        rank,
        key: finding.key,
        title,
        detail: finding.detail,
        sources,
        score,
    }
}

/// For strategies that order findings but never pick a side on claims.
pub(crate) fn escalate_all(result: &mut SynthesisResult, conflicts: &[ConflictRecord]) {
    for conflict in conflicts {
        result.push_conflict(conflict.clone().escalate(NOT_RECONCILED));
    }
}

pub(crate) fn fragment(result: &TaskResult, content: impl Into<String>) -> ClaimFragment {
    ClaimFragment {
        task_id: result.task_id.clone(),
        domain: result.domain.clone(),
        content: content.into(),
    }
}
