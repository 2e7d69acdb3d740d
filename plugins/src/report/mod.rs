pub mod json;
pub mod markdown;

pub use json::JsonReportRenderer;
pub use markdown::MarkdownReportRenderer;

#[cfg(test)]
pub(crate) mod fixture {
    use std::time::Duration;

    use chrono::Utc;
    use parawave_core::catalog::TaskSpec;
    use parawave_core::config::{FailureRecoveryPolicy, QualityRubric};
    use parawave_core::conflict::detect;
    use parawave_core::error::TaskError;
    use parawave_core::executor::types::{ExecutionPlan, Finding, TaskOutput, TaskResult};
    use parawave_core::report::{action_items, score, PerformanceRecord, RunReport, RunStatus};
    use parawave_core::synthesis::SynthesisStrategy;

    use crate::synthesis::RiskMatrixStrategy;

    /// Two analyses that disagree on auth, and a failed third task.
    pub fn report() -> RunReport {
        let finding = Finding {
            impact: 9.0,
            probability: 0.5,
            detail: "login form concatenates SQL".into(),
            ..Finding::new("sqli", "SQL injection in login")
        };
        let ok = |id: &str, domain: &str, output: TaskOutput| {
            TaskResult::from_outcome(
                &TaskSpec::new(id, "").with_domain(domain),
                1,
                Utc::now(),
                Duration::from_secs(2),
                Ok(output),
            )
        };
        let results = vec![
            ok(
                "security",
                "security",
                TaskOutput::with_summary("One critical injection risk.").claim("auth", "oauth2").finding(finding),
            ),
            ok("architecture", "architecture", TaskOutput::with_summary("Monolith is fine.").claim("auth", "basic")),
            TaskResult::from_outcome(
                &TaskSpec::new("synthesis", ""),
                3,
                Utc::now(),
                Duration::from_secs(1),
                Err(TaskError::execution("backend unavailable")),
            ),
        ];
        let conflicts = detect(&results);
        let synthesis = RiskMatrixStrategy.synthesize(&results, &conflicts);
        let performance = PerformanceRecord::evaluate(Duration::from_secs(240), Duration::from_secs(60), 3.0);
        let quality = score(&results, &QualityRubric::default());
        let unresolved = synthesis.unresolved().to_vec();
        let items = action_items(&results, &unresolved, &quality, &performance);
        let now = Utc::now();
        RunReport {
            run_id: "run-1".into(),
            started_at: now,
            finished_at: now,
            status: RunStatus::CompletedWithFailures,
            partial: false,
            policy: FailureRecoveryPolicy::ContinueOthers,
            plan: ExecutionPlan::from_stages(vec![
                vec!["security".into(), "architecture".into()],
                vec!["synthesis".into()],
            ]),
            attempts: results.clone(),
            results,
            waves: Vec::new(),
            review_required: quality.review_required,
            synthesis,
            performance,
            quality,
            unresolved_conflicts: unresolved,
            action_items: items,
        }
    }
}
