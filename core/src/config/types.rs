use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

pub const MIN_CONCURRENT_AGENTS: usize = 1;
pub const MAX_CONCURRENT_AGENTS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub quality: QualityRubric,

    #[serde(default)]
    pub runner: RunnerConfig,
}

impl AppConfig {
    /// Check every bound the engine relies on. Called before any task is dispatched.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        self.run.validate()?;
        self.quality.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or the data dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "parawave_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// What happens to the plan when a task fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureRecoveryPolicy {
    AbortAll,
    ContinueOthers,
    #[default]
    RetryFailed,
}

impl FailureRecoveryPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AbortAll => "abort_all",
            Self::ContinueOthers => "continue_others",
            Self::RetryFailed => "retry_failed",
        }
    }
}

impl fmt::Display for FailureRecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureRecoveryPolicy {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "abort_all" => Ok(Self::AbortAll),
            "continue_others" => Ok(Self::ContinueOthers),
            "retry_failed" => Ok(Self::RetryFailed),
            other => Err(ExecutorError::InvalidConfig(format!(
                "unknown failure_recovery policy '{other}'"
            ))),
        }
    }
}

/// Tuning preset for timeout and retry backoff defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl OptimizationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }

    pub fn default_task_timeout(self) -> Duration {
        match self {
            Self::Conservative => Duration::from_secs(600),
            Self::Balanced => Duration::from_secs(300),
            Self::Aggressive => Duration::from_secs(120),
        }
    }

    pub fn base_backoff_ms(self) -> u64 {
        match self {
            Self::Conservative => 2_000,
            Self::Balanced => 1_000,
            Self::Aggressive => 250,
        }
    }

    pub fn max_backoff_ms(self) -> u64 {
        match self {
            Self::Conservative => 30_000,
            Self::Balanced => 15_000,
            Self::Aggressive => 5_000,
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationLevel {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(ExecutorError::InvalidConfig(format!(
                "unknown optimization_level '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,

    #[serde(default)]
    pub failure_recovery: FailureRecoveryPolicy,

    #[serde(default)]
    pub optimization_level: OptimizationLevel,

    #[serde(default = "default_minimum_speedup_ratio")]
    pub minimum_speedup_ratio: f64,

    #[serde(default = "default_synthesis_strategy")]
    pub synthesis_strategy: String,

    /// Overrides the optimization level's per-task timeout when set.
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Declared sequential baseline. When unset the sum of task estimates is used.
    #[serde(default)]
    pub declared_baseline_secs: Option<u64>,
}

fn default_max_concurrent_agents() -> usize {
    4
}

fn default_minimum_speedup_ratio() -> f64 {
    4.0
}

fn default_synthesis_strategy() -> String {
    "integration-matrix".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            failure_recovery: FailureRecoveryPolicy::default(),
            optimization_level: OptimizationLevel::default(),
            minimum_speedup_ratio: default_minimum_speedup_ratio(),
            synthesis_strategy: default_synthesis_strategy(),
            default_timeout_secs: None,
            declared_baseline_secs: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if !(MIN_CONCURRENT_AGENTS..=MAX_CONCURRENT_AGENTS).contains(&self.max_concurrent_agents) {
            return Err(ExecutorError::InvalidConfig(format!(
                "max_concurrent_agents must be within {}..={}, got {}",
                MIN_CONCURRENT_AGENTS, MAX_CONCURRENT_AGENTS, self.max_concurrent_agents
            )));
        }
        if !self.minimum_speedup_ratio.is_finite() || self.minimum_speedup_ratio <= 0.0 {
            return Err(ExecutorError::InvalidConfig(format!(
                "minimum_speedup_ratio must be a positive number, got {}",
                self.minimum_speedup_ratio
            )));
        }
        if self.default_timeout_secs == Some(0) {
            return Err(ExecutorError::InvalidConfig(
                "default_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.synthesis_strategy.trim().is_empty() {
            return Err(ExecutorError::UnknownStrategy(String::new()));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.optimization_level.default_task_timeout())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    /// Falls back to the optimization level's base delay when unset.
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: None,
            max_delay_ms: None,
        }
    }
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

impl RetryConfig {
    pub fn base_delay_ms(&self, level: OptimizationLevel) -> u64 {
        self.base_delay_ms.unwrap_or_else(|| level.base_backoff_ms())
    }

    pub fn max_delay_ms(&self, level: OptimizationLevel) -> u64 {
        self.max_delay_ms.unwrap_or_else(|| level.max_backoff_ms())
    }
}

/// Weights for the four quality dimensions and the review gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRubric {
    #[serde(default = "default_completeness_weight")]
    pub completeness_weight: f64,
    #[serde(default = "default_accuracy_weight")]
    pub accuracy_weight: f64,
    #[serde(default = "default_testability_weight")]
    pub testability_weight: f64,
    #[serde(default = "default_clarity_weight")]
    pub clarity_weight: f64,
    /// Composite scores strictly below this value require human review.
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
}

fn default_completeness_weight() -> f64 {
    25.0
}

fn default_accuracy_weight() -> f64 {
    30.0
}

fn default_testability_weight() -> f64 {
    25.0
}

fn default_clarity_weight() -> f64 {
    20.0
}

fn default_review_threshold() -> f64 {
    85.0
}

impl Default for QualityRubric {
    fn default() -> Self {
        Self {
            completeness_weight: default_completeness_weight(),
            accuracy_weight: default_accuracy_weight(),
            testability_weight: default_testability_weight(),
            clarity_weight: default_clarity_weight(),
            review_threshold: default_review_threshold(),
        }
    }
}

impl QualityRubric {
    pub fn total_weight(&self) -> f64 {
        self.completeness_weight + self.accuracy_weight + self.testability_weight + self.clarity_weight
    }

    pub fn validate(&self) -> Result<(), ExecutorError> {
        let weights = [
            self.completeness_weight,
            self.accuracy_weight,
            self.testability_weight,
            self.clarity_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ExecutorError::InvalidConfig(
                "quality weights must be non-negative".to_string(),
            ));
        }
        if self.total_weight() <= 0.0 {
            return Err(ExecutorError::InvalidConfig(
                "quality weights must not all be zero".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.review_threshold) {
            return Err(ExecutorError::InvalidConfig(format!(
                "review_threshold must be within 0..=100, got {}",
                self.review_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum RunnerConfig {
    #[serde(rename = "command")]
    Command(CommandRunnerConfig),
    #[serde(rename = "replay")]
    Replay(ReplayRunnerConfig),
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig::Command(CommandRunnerConfig::default())
    }
}

/// What the command runner writes to the child's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StdinFormat {
    /// A plain-text prompt assembled from the task and its upstream summaries.
    #[default]
    Prompt,
    /// The full task request as one JSON document.
    Json,
}

/// Spawns `program args...` once per task attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRunnerConfig {
    #[serde(default = "default_runner_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub stdin_format: StdinFormat,
}

fn default_runner_program() -> String {
    "claude".to_string()
}

impl Default for CommandRunnerConfig {
    fn default() -> Self {
        Self {
            program: default_runner_program(),
            args: vec!["-p".to_string(), "--output-format".to_string(), "json".to_string()],
            env: BTreeMap::new(),
            stdin_format: StdinFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReplayRunnerConfig {
    pub outputs_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.run.max_concurrent_agents, 4);
        assert_eq!(cfg.run.failure_recovery, FailureRecoveryPolicy::RetryFailed);
        assert_eq!(cfg.run.minimum_speedup_ratio, 4.0);
        assert_eq!(cfg.quality.total_weight(), 100.0);
        assert_eq!(cfg.quality.review_threshold, 85.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut run = RunConfig::default();
        run.max_concurrent_agents = 0;
        assert!(run.validate().is_err());
        run.max_concurrent_agents = 17;
        assert!(run.validate().is_err());
        run.max_concurrent_agents = 16;
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_optimization_level_drives_timeout() {
        let mut run = RunConfig::default();
        run.optimization_level = OptimizationLevel::Aggressive;
        assert_eq!(run.default_timeout(), Duration::from_secs(120));
        run.default_timeout_secs = Some(7);
        assert_eq!(run.default_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_policy_parsing_accepts_both_spellings() {
        assert_eq!(
            "continue-others".parse::<FailureRecoveryPolicy>().unwrap(),
            FailureRecoveryPolicy::ContinueOthers
        );
        assert_eq!(
            "ABORT_ALL".parse::<FailureRecoveryPolicy>().unwrap(),
            FailureRecoveryPolicy::AbortAll
        );
        assert!("sometimes".parse::<FailureRecoveryPolicy>().is_err());
    }

    #[test]
    fn test_rubric_rejects_zero_weights() {
        let rubric = QualityRubric {
            completeness_weight: 0.0,
            accuracy_weight: 0.0,
            testability_weight: 0.0,
            clarity_weight: 0.0,
            review_threshold: 85.0,
        };
        assert!(rubric.validate().is_err());
    }

    #[test]
    fn test_toml_sections_parse() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [run]
            max_concurrent_agents = 8
            failure_recovery = "continue_others"
            optimization_level = "conservative"
            synthesis_strategy = "risk-matrix"

            [quality]
            review_threshold = 90.0

            [runner]
            provider = "replay"
            outputs_file = "outputs.json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.run.max_concurrent_agents, 8);
        assert_eq!(cfg.run.failure_recovery, FailureRecoveryPolicy::ContinueOthers);
        assert_eq!(cfg.run.optimization_level, OptimizationLevel::Conservative);
        assert_eq!(cfg.quality.review_threshold, 90.0);
        assert_eq!(cfg.quality.accuracy_weight, 30.0);
        assert!(matches!(cfg.runner, RunnerConfig::Replay(ref r) if r.outputs_file == "outputs.json"));
    }
}
