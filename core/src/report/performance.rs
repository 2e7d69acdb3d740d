use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::TaskSpec;
use crate::error::ExecutorError;
use crate::executor::types::ExecutionPlan;
use crate::executor::TaskGraph;

/// Smallest measured duration; keeps the ratio finite.
const MIN_ACTUAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Supplied with the run configuration.
    Declared,
    /// Sum of every task's estimated duration.
    Estimated,
}

impl fmt::Display for BaselineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declared => "declared",
            Self::Estimated => "estimated",
        })
    }
}

/// Parallel wall-clock time against the sequential baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub baseline_secs: f64,
    pub baseline_source: BaselineSource,
    pub actual_secs: f64,
    pub speedup_ratio: f64,
    pub minimum_ratio: f64,
    pub passed: bool,
    /// Sum of estimates along the longest dependency chain.
    pub critical_path_secs: f64,
    pub critical_path: Vec<String>,
    pub waves: usize,
    pub widest_wave: usize,
}

impl PerformanceRecord {
    /// Speedup = baseline / actual; passes when the ratio reaches `minimum_ratio`.
    pub fn evaluate(baseline: Duration, actual: Duration, minimum_ratio: f64) -> Self {
        let actual = actual.max(MIN_ACTUAL);
        let speedup_ratio = baseline.as_secs_f64() / actual.as_secs_f64();
        Self {
            baseline_secs: baseline.as_secs_f64(),
            baseline_source: BaselineSource::Declared,
            actual_secs: actual.as_secs_f64(),
            speedup_ratio,
            minimum_ratio,
            passed: speedup_ratio >= minimum_ratio,
            critical_path_secs: 0.0,
            critical_path: Vec::new(),
            waves: 0,
            widest_wave: 0,
        }
    }

    /// Full record for a run: baseline resolution, critical path and plan shape.
    pub fn record(
        graph: &TaskGraph<TaskSpec>,
        plan: &ExecutionPlan,
        actual: Duration,
        declared_baseline: Option<Duration>,
        minimum_ratio: f64,
    ) -> Result<Self, ExecutorError> {
        let (baseline, source) = match declared_baseline {
            Some(b) => (b, BaselineSource::Declared),
            None => (
                graph
                    .nodes
                    .values()
                    .map(TaskSpec::estimated_duration)
                    .fold(Duration::ZERO, Duration::saturating_add),
                BaselineSource::Estimated,
            ),
        };
        let (critical, path) = graph.critical_path(TaskSpec::estimated_duration)?;

        let mut record = Self::evaluate(baseline, actual, minimum_ratio);
        record.baseline_source = source;
        record.critical_path_secs = critical.as_secs_f64();
        record.critical_path = path;
        record.waves = plan.len();
        record.widest_wave = plan.widest_wave();
        Ok(record)
    }

    /// Best ratio any schedule could reach: baseline over critical path.
    pub fn theoretical_max_ratio(&self) -> Option<f64> {
        (self.critical_path_secs > 0.0).then(|| self.baseline_secs / self.critical_path_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_passes_above_minimum() {
        let record = PerformanceRecord::evaluate(Duration::from_secs(240), Duration::from_secs(55), 4.0);
        assert!((record.speedup_ratio - 4.3636).abs() < 0.001);
        assert!(record.passed);
    }

    #[test]
    fn test_ratio_fails_below_minimum() {
        let record = PerformanceRecord::evaluate(Duration::from_secs(240), Duration::from_secs(65), 4.0);
        assert!((record.speedup_ratio - 3.6923).abs() < 0.001);
        assert!(!record.passed);
    }

    #[test]
    fn test_zero_actual_is_clamped() {
        let record = PerformanceRecord::evaluate(Duration::from_secs(1), Duration::ZERO, 4.0);
        assert!(record.speedup_ratio.is_finite());
        assert_eq!(record.actual_secs, 0.001);
    }

    #[test]
    fn test_record_uses_estimates_without_declared_baseline() {
        let secs = Duration::from_secs;
        let tasks = vec![
            TaskSpec::new("a", "").with_estimate(secs(60)),
            TaskSpec::new("b", "").with_estimate(secs(60)),
            TaskSpec::new("c", "").with_estimate(secs(30)).depends_on(["a", "b"]),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let plan = graph.build_plan().unwrap();

        let record = PerformanceRecord::record(&graph, &plan, secs(90), None, 1.5).unwrap();
        assert_eq!(record.baseline_source, BaselineSource::Estimated);
        assert_eq!(record.baseline_secs, 150.0);
        assert_eq!(record.critical_path, vec!["a", "c"]);
        assert_eq!(record.critical_path_secs, 90.0);
        assert_eq!(record.waves, 2);
        assert_eq!(record.widest_wave, 2);
        assert!(record.passed);

        let declared = PerformanceRecord::record(&graph, &plan, secs(90), Some(secs(45)), 1.5).unwrap();
        assert_eq!(declared.baseline_source, BaselineSource::Declared);
        assert!(!declared.passed);
    }

    #[test]
    fn test_record_survives_oversized_estimates() {
        let tasks = vec![
            TaskSpec::new("a", "").with_estimate(Duration::from_secs(u64::MAX)),
            TaskSpec::new("b", "").with_estimate(Duration::from_secs(u64::MAX)),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let plan = graph.build_plan().unwrap();

        let record = PerformanceRecord::record(&graph, &plan, Duration::from_secs(1), None, 1.5).unwrap();
        assert_eq!(record.baseline_secs, Duration::MAX.as_secs_f64());
        assert!(record.speedup_ratio.is_finite());
        assert!(record.passed);
    }
}
