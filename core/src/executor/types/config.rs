use std::time::Duration;

use crate::config::{AppConfig, FailureRecoveryPolicy, OptimizationLevel, QualityRubric};

/// Resolved, validated options for one run of the execution engine.
#[derive(Debug, Clone)]
pub struct ExecutionOpts {
    /// Semaphore permits per wave (1-16).
    pub max_concurrency: usize,

    pub failure_recovery: FailureRecoveryPolicy,

    pub optimization_level: OptimizationLevel,

    /// Applied to tasks that declare no timeout of their own.
    pub default_timeout: Duration,

    pub minimum_speedup_ratio: f64,

    /// Overrides the sum of task estimates when set.
    pub declared_baseline: Option<Duration>,

    pub synthesis_strategy: String,

    pub rubric: QualityRubric,
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ExecutionOpts {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_concurrency: cfg.run.max_concurrent_agents,
            failure_recovery: cfg.run.failure_recovery,
            optimization_level: cfg.run.optimization_level,
            default_timeout: cfg.run.default_timeout(),
            minimum_speedup_ratio: cfg.run.minimum_speedup_ratio,
            declared_baseline: cfg.run.declared_baseline_secs.map(Duration::from_secs),
            synthesis_strategy: cfg.run.synthesis_strategy.clone(),
            rubric: cfg.quality.clone(),
        }
    }

    pub fn with_policy(mut self, policy: FailureRecoveryPolicy) -> Self {
        self.failure_recovery = policy;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_declared_baseline(mut self, baseline: Duration) -> Self {
        self.declared_baseline = Some(baseline);
        self
    }
}
