use parawave_core::conflict::ConflictRecord;
use parawave_core::executor::types::{Finding, TaskResult};
use parawave_core::synthesis::{SynthesisResult, SynthesisStrategy};

use super::{collect_findings, escalate_all, rank_descending};

/// Orders findings by value per unit of effort.
pub struct ValueEffortStrategy;

/// Non-positive effort counts as one unit.
fn ratio(finding: &Finding) -> f64 {
    let effort = if finding.effort > 0.0 { finding.effort } else { 1.0 };
    finding.value / effort
}

impl SynthesisStrategy for ValueEffortStrategy {
    fn name(&self) -> &str {
        "value-effort"
    }

    fn description(&self) -> &str {
        "order findings by value / effort"
    }

    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult {
        let mut out = SynthesisResult::new(self.name(), results);
        let scored = collect_findings(results)
            .into_iter()
            .map(|f| {
                let score = ratio(&f.finding);
                (f, score)
            })
            .collect();
        out.items = rank_descending(scored);
        escalate_all(&mut out, conflicts);
        out
    }
}
