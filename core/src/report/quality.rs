use serde::{Deserialize, Serialize};

use crate::config::QualityRubric;
use crate::executor::types::{TaskOutput, TaskResult};

/// Dimension scores for one task output, each 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputScore {
    pub task_id: String,
    pub domain: String,
    pub completeness: f64,
    pub accuracy: f64,
    pub testability: f64,
    pub clarity: f64,
    pub composite: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub outputs: Vec<OutputScore>,
    /// Mean of the per-output composites.
    pub composite: f64,
    pub threshold: f64,
    pub review_required: bool,
}

impl QualityScore {
    pub fn from_outputs(outputs: Vec<OutputScore>, threshold: f64) -> Self {
        let composite = if outputs.is_empty() {
            0.0
        } else {
            outputs.iter().map(|o| o.composite).sum::<f64>() / outputs.len() as f64
        };
        Self {
            outputs,
            composite,
            threshold,
            review_required: composite < threshold,
        }
    }
}

/// Score every final task result against the rubric.
pub fn score(results: &[TaskResult], rubric: &QualityRubric) -> QualityScore {
    let outputs = results.iter().map(|r| score_result(r, rubric)).collect();
    QualityScore::from_outputs(outputs, rubric.review_threshold)
}

fn score_result(result: &TaskResult, rubric: &QualityRubric) -> OutputScore {
    let [completeness, accuracy, testability, clarity] = match (&result.output, result.is_success()) {
        (Some(output), true) => dimensions(output),
        _ => [0.0; 4],
    };
    let total = rubric.total_weight();
    let composite = if total > 0.0 {
        (completeness * rubric.completeness_weight
            + accuracy * rubric.accuracy_weight
            + testability * rubric.testability_weight
            + clarity * rubric.clarity_weight)
            / total
    } else {
        0.0
    };
    OutputScore {
        task_id: result.task_id.clone(),
        domain: result.domain.clone(),
        completeness,
        accuracy,
        testability,
        clarity,
        composite,
    }
}

fn dimensions(output: &TaskOutput) -> [f64; 4] {
    let assessed = output.assessment.clone().unwrap_or_default();

    let completeness = assessed
        .completeness
        .unwrap_or(if output.has_content() { 100.0 } else { 0.0 });
    let accuracy = assessed.accuracy.unwrap_or(100.0);
    let testability = assessed.testability.unwrap_or_else(|| {
        if output.findings.is_empty() {
            100.0
        } else {
            let detailed = output.findings.iter().filter(|f| !f.detail.trim().is_empty()).count();
            detailed as f64 * 100.0 / output.findings.len() as f64
        }
    });
    let clarity = assessed
        .clarity
        .unwrap_or(if output.summary.trim().is_empty() { 60.0 } else { 100.0 });

    [completeness, accuracy, testability, clarity].map(|v| v.clamp(0.0, 100.0))
}
