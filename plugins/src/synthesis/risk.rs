use parawave_core::conflict::ConflictRecord;
use parawave_core::executor::types::TaskResult;
use parawave_core::synthesis::{SynthesisResult, SynthesisStrategy};

use super::{collect_findings, escalate_all, rank_descending};

/// Ranks findings by impact × probability, highest risk first.
pub struct RiskMatrixStrategy;

impl SynthesisStrategy for RiskMatrixStrategy {
    fn name(&self) -> &str {
        "risk-matrix"
    }

    fn description(&self) -> &str {
        "rank findings by impact x probability"
    }

    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult {
        let mut out = SynthesisResult::new(self.name(), results);
        let scored = collect_findings(results)
            .into_iter()
            .map(|f| {
                let risk = f.finding.impact * f.finding.probability;
                (f, risk)
            })
            .collect();
        out.items = rank_descending(scored);
        escalate_all(&mut out, conflicts);
        out
    }
}
