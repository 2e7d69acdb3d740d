use std::collections::BTreeMap;
use std::fmt::Write as _;

use parawave_core::error::ExecutorError;
use parawave_core::executor::types::{TaskResult, TaskStatus};
use parawave_core::report::{ReportRenderer, RunReport};

/// Human-readable report with fixed section order.
pub struct MarkdownReportRenderer;

impl ReportRenderer for MarkdownReportRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    fn render(&self, report: &RunReport) -> Result<String, ExecutorError> {
        let mut doc = String::new();
        write_report(&mut doc, report).map_err(|e| ExecutorError::Render(e.to_string()))?;
        Ok(doc)
    }
}

fn write_report(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(doc, "# Run report `{}`", report.run_id)?;
    writeln!(doc)?;
    executive_summary(doc, report)?;
    execution_plan(doc, report)?;
    findings_by_domain(doc, report)?;
    synthesis(doc, report)?;
    conflicts(doc, report)?;
    performance(doc, report)?;
    quality(doc, report)?;
    action_items(doc, report)?;
    Ok(())
}

fn executive_summary(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    let summary = report.summary();
    writeln!(doc, "## Executive Summary")?;
    writeln!(doc)?;
    writeln!(
        doc,
        "- Status: **{}**{}",
        report.status,
        if report.partial { " (partial)" } else { "" }
    )?;
    writeln!(doc, "- Policy: `{}`", report.policy)?;
    writeln!(
        doc,
        "- Tasks: {} total, {} succeeded, {} failed, {} cancelled",
        summary.total_tasks, summary.succeeded, summary.failed, summary.cancelled
    )?;
    writeln!(
        doc,
        "- Speedup: {:.2}x ({})",
        report.performance.speedup_ratio,
        if report.performance.passed { "target met" } else { "target missed" }
    )?;
    writeln!(doc, "- Quality: {:.1} / 100", report.quality.composite)?;
    writeln!(doc, "- Unresolved conflicts: {}", report.unresolved_conflicts.len())?;
    if report.review_required {
        writeln!(doc, "- **Human review required**")?;
    }
    writeln!(doc)
}

fn execution_plan(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(doc, "## Execution Plan")?;
    writeln!(doc)?;
    writeln!(doc, "| Wave | Task | Status | Attempt | Duration |")?;
    writeln!(doc, "|------|------|--------|---------|----------|")?;
    let by_id: BTreeMap<&str, &TaskResult> = report.results.iter().map(|r| (r.task_id.as_str(), r)).collect();
    for wave in &report.plan.waves {
        for id in &wave.task_ids {
            match by_id.get(id.as_str()) {
                Some(r) => writeln!(
                    doc,
                    "| {} | {} | {} | {} | {:.1}s |",
                    wave.index + 1,
                    id,
                    r.status,
                    r.attempt,
                    r.duration_ms as f64 / 1000.0
                )?,
                None => writeln!(doc, "| {} | {} | not run | - | - |", wave.index + 1, id)?,
            }
        }
    }
    writeln!(doc)
}

fn findings_by_domain(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(doc, "## Findings by Domain")?;
    writeln!(doc)?;
    let mut domains: BTreeMap<&str, Vec<&TaskResult>> = BTreeMap::new();
    for r in &report.results {
        domains.entry(r.domain.as_str()).or_default().push(r);
    }
    for (domain, results) in domains {
        writeln!(doc, "### {}", domain)?;
        writeln!(doc)?;
        for r in results {
            match (&r.output, r.status) {
                (Some(output), TaskStatus::Succeeded) => {
                    let summary = output.summary.trim();
                    writeln!(doc, "- **{}**: {}", r.task_id, if summary.is_empty() { "(no summary)" } else { summary })?;
                    for f in &output.findings {
                        let title = if f.title.is_empty() { &f.key } else { &f.title };
                        writeln!(doc, "  - {}", title)?;
                    }
                }
                _ => writeln!(
                    doc,
                    "- **{}**: _{}_{}",
                    r.task_id,
                    r.status,
                    r.error.as_deref().map(|e| format!(" ({e})")).unwrap_or_default()
                )?,
            }
        }
        writeln!(doc)?;
    }
    Ok(())
}

fn synthesis(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    let result = &report.synthesis;
    writeln!(doc, "## Synthesis (`{}`)", result.strategy)?;
    writeln!(doc)?;
    if result.items.is_empty() {
        writeln!(doc, "No ranked items.")?;
    } else {
        writeln!(doc, "| Rank | Item | Score | Sources |")?;
        writeln!(doc, "|------|------|-------|---------|")?;
        for item in &result.items {
            writeln!(
                doc,
                "| {} | {} | {:.2} | {} |",
                item.rank,
                escape_cell(&item.title),
                item.score,
                item.sources.join(", ")
            )?;
        }
    }
    if !result.cross_checks.is_empty() {
        writeln!(doc)?;
        writeln!(doc, "| Pair | Constraints checked | Violations |")?;
        writeln!(doc, "|------|---------------------|------------|")?;
        for check in &result.cross_checks {
            writeln!(
                doc,
                "| {} / {} | {} | {} |",
                check.left, check.right, check.constraints_checked, check.violations
            )?;
        }
    }
    for note in &result.notes {
        writeln!(doc)?;
        writeln!(doc, "> {}", note)?;
    }
    writeln!(doc)
}

fn conflicts(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(doc, "## Conflicts")?;
    writeln!(doc)?;
    let resolved = &report.synthesis.resolved;
    if resolved.is_empty() && report.unresolved_conflicts.is_empty() {
        writeln!(doc, "None.")?;
        return writeln!(doc);
    }
    for c in resolved {
        writeln!(
            doc,
            "- `{}` resolved to '{}' ({})",
            c.claim,
            c.resolution.as_deref().unwrap_or_default().trim(),
            c.reason.as_deref().unwrap_or_default()
        )?;
    }
    for c in &report.unresolved_conflicts {
        writeln!(
            doc,
            "- `{}` **escalated**: {} says '{}', {} says '{}'",
            c.claim,
            c.left.task_id,
            c.left.content.trim(),
            c.right.task_id,
            c.right.content.trim()
        )?;
    }
    writeln!(doc)
}

fn performance(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    let p = &report.performance;
    writeln!(doc, "## Performance")?;
    writeln!(doc)?;
    writeln!(doc, "| Metric | Value |")?;
    writeln!(doc, "|--------|-------|")?;
    writeln!(doc, "| Sequential baseline | {:.1}s ({:?}) |", p.baseline_secs, p.baseline_source)?;
    writeln!(doc, "| Parallel wall clock | {:.1}s |", p.actual_secs)?;
    writeln!(doc, "| Speedup | {:.2}x |", p.speedup_ratio)?;
    writeln!(doc, "| Required | {:.2}x |", p.minimum_ratio)?;
    if let Some(max) = p.theoretical_max_ratio() {
        writeln!(doc, "| Critical path | {:.1}s ({}) |", p.critical_path_secs, p.critical_path.join(" -> "))?;
        writeln!(doc, "| Theoretical max | {:.2}x |", max)?;
    }
    writeln!(doc, "| Result | {} |", if p.passed { "PASS" } else { "FAIL" })?;
    writeln!(doc)
}

fn quality(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    let q = &report.quality;
    writeln!(doc, "## Quality")?;
    writeln!(doc)?;
    writeln!(doc, "| Task | Completeness | Accuracy | Testability | Clarity | Composite |")?;
    writeln!(doc, "|------|--------------|----------|-------------|---------|-----------|")?;
    for o in &q.outputs {
        writeln!(
            doc,
            "| {} | {:.0} | {:.0} | {:.0} | {:.0} | {:.1} |",
            o.task_id, o.completeness, o.accuracy, o.testability, o.clarity, o.composite
        )?;
    }
    writeln!(doc)?;
    writeln!(
        doc,
        "Composite {:.1} against a review threshold of {:.1}.",
        q.composite, q.threshold
    )?;
    writeln!(doc)
}

fn action_items(doc: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(doc, "## Action Items")?;
    writeln!(doc)?;
    if report.action_items.is_empty() {
        return writeln!(doc, "None.");
    }
    for item in &report.action_items {
        writeln!(doc, "- [ ] **{}** {}", item.subject, item.detail)?;
    }
    Ok(())
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
