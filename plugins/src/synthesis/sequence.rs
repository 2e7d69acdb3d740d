use std::collections::{BTreeSet, HashMap};

use parawave_core::conflict::ConflictRecord;
use parawave_core::executor::types::TaskResult;
use parawave_core::synthesis::{SynthesisResult, SynthesisStrategy};

use super::{collect_findings, escalate_all, to_item, SourcedFinding};

/// Orders findings so that every `depends_on` key comes first.
///
/// Among the findings that are ready, the one that directly unblocks the most
/// others goes next; ties keep first-seen order. Findings caught in a cycle
/// are appended in first-seen order and the cycle is reported as a note.
pub struct DependencySequenceStrategy;

impl SynthesisStrategy for DependencySequenceStrategy {
    fn name(&self) -> &str {
        "dependency-sequence"
    }

    fn description(&self) -> &str {
        "order findings by their dependencies, unblocking the most first"
    }

    fn synthesize(&self, results: &[TaskResult], conflicts: &[ConflictRecord]) -> SynthesisResult {
        let mut out = SynthesisResult::new(self.name(), results);
        let findings = collect_findings(results);
        let index: HashMap<&str, usize> =
            findings.iter().enumerate().map(|(i, f)| (f.finding.key.as_str(), i)).collect();

        let mut in_degree = vec![0usize; findings.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); findings.len()];
        for (i, f) in findings.iter().enumerate() {
            let deps: BTreeSet<&str> = f.finding.depends_on.iter().map(String::as_str).collect();
            for dep in deps {
                match index.get(dep) {
                    Some(&d) if d != i => {
                        dependents[d].push(i);
                        in_degree[i] += 1;
                    }
                    Some(_) => out.notes.push(format!("finding '{}' depends on itself", f.finding.key)),
                    None => out
                        .notes
                        .push(format!("finding '{}' depends on unknown finding '{}'", f.finding.key, dep)),
                }
            }
        }

        let mut placed = vec![false; findings.len()];
        let mut order = Vec::with_capacity(findings.len());
        loop {
            // Highest unblock count wins; `max_by_key` keeps the last maximum,
            // so iterate in reverse to prefer the earliest finding.
            let next = (0..findings.len())
                .rev()
                .filter(|&i| !placed[i] && in_degree[i] == 0)
                .max_by_key(|&i| dependents[i].len());
            let Some(i) = next else {
                break;
            };
            placed[i] = true;
            order.push(i);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
            }
        }

        let stuck: Vec<usize> = (0..findings.len()).filter(|&i| !placed[i]).collect();
        if !stuck.is_empty() {
            let keys: Vec<&str> = stuck.iter().map(|&i| findings[i].finding.key.as_str()).collect();
            tracing::debug!(findings = ?keys, "dependency cycle among findings");
            out.notes.push(format!("dependency cycle among findings: {}", keys.join(", ")));
            order.extend(stuck);
        }

        let unblocks: Vec<usize> = dependents.iter().map(Vec::len).collect();
        let mut slots: Vec<Option<SourcedFinding>> = findings.into_iter().map(Some).collect();
        out.items = order
            .into_iter()
            .enumerate()
            .filter_map(|(pos, i)| slots[i].take().map(|f| to_item(pos + 1, f, unblocks[i] as f64)))
            .collect();

        escalate_all(&mut out, conflicts);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::test_support::ok;
    use parawave_core::executor::types::{Finding, TaskOutput};
    use pretty_assertions::assert_eq;

    fn step(key: &str, deps: &[&str]) -> Finding {
        Finding {
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..Finding::new(key, "")
        }
    }

    fn keys(out: &SynthesisResult) -> Vec<&str> {
        out.items.iter().map(|i| i.key.as_str()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let results = vec![
            ok("arch", "architecture", TaskOutput::default().finding(step("deploy", &["schema", "auth"]))),
            ok("data", "data", TaskOutput::default().finding(step("schema", &[])).finding(step("auth", &[]))),
            ok("api", "api", TaskOutput::default().finding(step("endpoints", &["auth"]))),
        ];
        let out = DependencySequenceStrategy.synthesize(&results, &[]);
        // auth unblocks two findings, schema only one.
        assert_eq!(keys(&out), vec!["auth", "schema", "deploy", "endpoints"]);
        assert_eq!(out.items[0].score, 2.0);
        assert!(out.notes.is_empty());
    }

    #[test]
    fn test_cycles_are_reported_as_notes() {
        let output = TaskOutput::default()
            .finding(step("a", &["b"]))
            .finding(step("b", &["a"]))
            .finding(step("c", &["missing"]));
        let out = DependencySequenceStrategy.synthesize(&[ok("t", "general", output)], &[]);
        assert_eq!(keys(&out), vec!["c", "a", "b"]);
        assert_eq!(
            out.notes,
            vec![
                "finding 'c' depends on unknown finding 'missing'".to_string(),
                "dependency cycle among findings: a, b".to_string(),
            ]
        );
    }

    #[test]
    fn test_same_input_same_result() {
        let results = vec![ok(
            "t",
            "general",
            TaskOutput::default().finding(step("x", &[])).finding(step("y", &[])).finding(step("z", &["x", "y"])),
        )];
        let first = serde_json::to_string(&DependencySequenceStrategy.synthesize(&results, &[])).unwrap();
        let second = serde_json::to_string(&DependencySequenceStrategy.synthesize(&results, &[])).unwrap();
        assert_eq!(first, second);
    }
}
