use std::collections::BTreeMap;

use parawave_core::conflict::ConflictRecord;
use parawave_core::executor::types::{Constraint, TaskOutput, TaskResult};
use parawave_core::synthesis::{succeeded, MergedItem, PairCheck, SynthesisResult, SynthesisStrategy};

use super::fragment;

/// Cross-validates every pair of outputs against each other's constraints.
///
/// Each violated constraint is escalated. A claim conflict is resolved in
/// favour of the side that alone satisfies every constraint declared on the
/// claim; otherwise it is escalated.
pub struct IntegrationMatrixStrategy;

impl IntegrationMatrixStrategy {
    fn check_pair(
        &self,
        (declarer, declared): (&TaskResult, &TaskOutput),
        (claimant, claims): (&TaskResult, &TaskOutput),
        check: &mut PairCheck,
        out: &mut SynthesisResult,
    ) {
        for constraint in &declared.constraints {
            let Some(content) = claims.claims.get(&constraint.claim) else {
                continue;
            };
            check.constraints_checked += 1;
            if constraint.permits(content) {
                continue;
            }
            check.violations += 1;
            let mut reason = format!("{} violates a constraint declared by {}", claimant.task_id, declarer.task_id);
            if !constraint.reason.is_empty() {
                reason.push_str(": ");
                reason.push_str(&constraint.reason);
            }
            let record = ConflictRecord::new(
                constraint.claim.clone(),
                fragment(declarer, format!("allowed: {}", constraint.allowed.join(", "))),
                fragment(claimant, content.clone()),
            )
            .escalate(reason);
            out.push_conflict(record);
        }
    }
}

impl SynthesisStrategy for IntegrationMatrixStrategy {
    fn name(&self) -> &str {
        "integration-matrix"
    }

    fn description(&self) -> &str {
        "pairwise cross-validation of claims against declared constraints"
    }

    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult {
        let mut out = SynthesisResult::new(self.name(), results);
        let outputs: Vec<(&TaskResult, &TaskOutput)> = succeeded(results)
            .into_iter()
            .filter_map(|r| r.output.as_ref().map(|o| (r, o)))
            .collect();

        for (i, left) in outputs.iter().enumerate() {
            for right in outputs.iter().skip(i + 1) {
                let mut check = PairCheck {
                    left: left.0.task_id.clone(),
                    right: right.0.task_id.clone(),
                    constraints_checked: 0,
                    violations: 0,
                };
                self.check_pair(*left, *right, &mut check, &mut out);
                self.check_pair(*right, *left, &mut check, &mut out);
                out.cross_checks.push(check);
            }
        }

        let mut declared: BTreeMap<&str, Vec<&Constraint>> = BTreeMap::new();
        for (_, output) in &outputs {
            for constraint in &output.constraints {
                declared.entry(constraint.claim.as_str()).or_default().push(constraint);
            }
        }
        let satisfies = |claim: &str, content: &str| {
            declared
                .get(claim)
                .map_or(true, |cs| cs.iter().all(|c| c.permits(content)))
        };

        let mut settled: BTreeMap<String, String> = BTreeMap::new();
        for conflict in conflicts {
            let left_ok = satisfies(&conflict.claim, &conflict.left.content);
            let right_ok = satisfies(&conflict.claim, &conflict.right.content);
            let record = match (left_ok, right_ok) {
                (true, false) => Some(&conflict.left),
                (false, true) => Some(&conflict.right),
                _ => None,
            }
            .map(|winner| {
                settled.insert(conflict.claim.clone(), winner.content.trim().to_string());
                conflict.clone().auto_resolve(
                    winner.content.clone(),
                    format!("only {} satisfies the declared constraints", winner.task_id),
                )
            })
            .unwrap_or_else(|| {
                let why = if left_ok {
                    "both sides satisfy the declared constraints"
                } else {
                    "neither side satisfies the declared constraints"
                };
                conflict.clone().escalate(why)
            });
            out.push_conflict(record);
        }

        // Merged view: one item per claim that is either agreed on or settled.
        let mut claimed: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
        for (result, output) in &outputs {
            for (claim, content) in &output.claims {
                claimed.entry(claim.as_str()).or_default().push((result.task_id.as_str(), content.trim()));
            }
        }
        for (claim, sides) in claimed {
            let agreed = sides.windows(2).all(|w| w[0].1 == w[1].1).then(|| sides[0].1.to_string());
            let Some(content) = agreed.or_else(|| settled.get(claim).cloned()) else {
                continue;
            };
            let sources: Vec<String> =
                sides.iter().filter(|(_, c)| *c == content).map(|(id, _)| id.to_string()).collect();
            out.items.push(MergedItem {
                rank: out.items.len() + 1,
                key: claim.to_string(),
                score: sources.len() as f64,
                title: content,
                detail: String::new(),
                sources,
            });
        }
        out
    }
}
