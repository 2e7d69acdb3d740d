use std::collections::BTreeMap;

use parawave_core::conflict::ConflictRecord;
use parawave_core::executor::types::TaskResult;
use parawave_core::synthesis::{succeeded, MergedItem, SynthesisResult, SynthesisStrategy};

/// Tally of one claim across every output that makes it.
#[derive(Debug, Default)]
struct Tally {
    /// Distinct trimmed contents with their supporters, first-seen order.
    votes: Vec<(String, Vec<String>)>,
}

impl Tally {
    fn add(&mut self, content: &str, task_id: &str) {
        let content = content.trim();
        match self.votes.iter_mut().find(|(c, _)| c == content) {
            Some((_, voters)) => voters.push(task_id.to_string()),
            None => self.votes.push((content.to_string(), vec![task_id.to_string()])),
        }
    }

    fn claimants(&self) -> usize {
        self.votes.iter().map(|(_, v)| v.len()).sum()
    }

    /// The content backed by more than half of the claimants.
    fn majority(&self) -> Option<&(String, Vec<String>)> {
        let total = self.claimants();
        self.votes.iter().find(|(_, voters)| voters.len() * 2 > total)
    }
}

/// Settles each claim by strict majority among the outputs that make it.
pub struct ConsensusStrategy;

impl SynthesisStrategy for ConsensusStrategy {
    fn name(&self) -> &str {
        "consensus"
    }

    fn description(&self) -> &str {
        "majority view per claim; ties are escalated"
    }

    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult {
        let mut out = SynthesisResult::new(self.name(), results);

        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
        for result in succeeded(results) {
            let Some(output) = result.output.as_ref() else {
                continue;
            };
            for (claim, content) in &output.claims {
                tallies.entry(claim.as_str()).or_default().add(content, &result.task_id);
            }
        }

        for (claim, tally) in &tallies {
            if let Some((content, voters)) = tally.majority() {
                out.items.push(MergedItem {
                    rank: out.items.len() + 1,
                    key: claim.to_string(),
                    title: content.clone(),
                    detail: String::new(),
                    sources: voters.clone(),
                    score: voters.len() as f64 / tally.claimants() as f64,
                });
            }
        }

        for conflict in conflicts {
            let record = match tallies.get(conflict.claim.as_str()) {
                Some(tally) => match tally.majority() {
                    Some((content, voters)) => conflict.clone().auto_resolve(
                        content.clone(),
                        format!("majority {} of {}", voters.len(), tally.claimants()),
                    ),
                    None => conflict.clone().escalate(format!(
                        "no strict majority among {} outputs",
                        tally.claimants()
                    )),
                },
                None => conflict.clone().escalate("claim not present in synthesized outputs"),
            };
            out.push_conflict(record);
        }
        out
    }
}
