use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use parawave_core::config::{AppConfig, RunnerConfig};
use parawave_core::error::ExecutorError;
use parawave_core::executor::traits::{OutputRendererPlugin, RetryStrategyPlugin, TaskRunner};
use parawave_core::report::ReportRenderer;
use parawave_core::synthesis::SynthesisStrategy;

use crate::executor::{
    BackoffBounds, ExponentialBackoffPlugin, JsonlRendererPlugin, LinearRetryPlugin, TextRendererPlugin,
};
use crate::report::{JsonReportRenderer, MarkdownReportRenderer};
use crate::runner::{CommandRunnerPlugin, ReplayRunnerPlugin};
use crate::synthesis::{
    ConsensusStrategy, DependencySequenceStrategy, IntegrationMatrixStrategy, RiskMatrixStrategy,
    ValueEffortStrategy,
};

/// Every registered synthesis strategy, in display order.
pub fn synthesis_strategies() -> Vec<Arc<dyn SynthesisStrategy>> {
    vec![
        Arc::new(IntegrationMatrixStrategy),
        Arc::new(RiskMatrixStrategy),
        Arc::new(ConsensusStrategy),
        Arc::new(ValueEffortStrategy),
        Arc::new(DependencySequenceStrategy),
    ]
}

pub fn strategy_names() -> Vec<String> {
    synthesis_strategies().iter().map(|s| s.name().to_string()).collect()
}

/// Resolve a strategy by name. Unknown names are fatal before dispatch.
pub fn build_synthesis(name: &str) -> Result<Arc<dyn SynthesisStrategy>, ExecutorError> {
    synthesis_strategies()
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| ExecutorError::UnknownStrategy(name.to_string()))
}

pub fn build_retry(cfg: &AppConfig) -> Result<Arc<dyn RetryStrategyPlugin>, ExecutorError> {
    let bounds = BackoffBounds::from_config(&cfg.retry, cfg.run.optimization_level);
    match cfg.retry.strategy.as_str() {
        "exponential-backoff" | "exponential" => Ok(Arc::new(ExponentialBackoffPlugin::new(bounds))),
        "linear" => Ok(Arc::new(LinearRetryPlugin::new(bounds))),
        other => Err(ExecutorError::InvalidConfig(format!("unknown retry strategy: {other}"))),
    }
}

/// Event renderer for `--events`; `none` and unknown names yield no renderer.
pub fn build_renderer(name: &str, ascii_only: bool) -> Option<Arc<dyn OutputRendererPlugin>> {
    match name {
        "text" => Some(Arc::new(TextRendererPlugin::new(ascii_only))),
        "jsonl" => Some(Arc::new(JsonlRendererPlugin::new(false))),
        _ => None,
    }
}

pub fn build_report_renderer(format: &str) -> Result<Box<dyn ReportRenderer>, ExecutorError> {
    match format {
        "markdown" | "md" => Ok(Box::new(MarkdownReportRenderer)),
        "json" => Ok(Box::new(JsonReportRenderer::default())),
        other => Err(ExecutorError::InvalidConfig(format!("unknown report format: {other}"))),
    }
}

pub fn build_runner(cfg: &AppConfig) -> Result<Arc<dyn TaskRunner>> {
    match &cfg.runner {
        RunnerConfig::Command(cmd) => Ok(Arc::new(CommandRunnerPlugin::new(cmd.clone()))),
        RunnerConfig::Replay(replay) => Ok(Arc::new(ReplayRunnerPlugin::from_file(Path::new(
            &replay.outputs_file,
        ))?)),
    }
}
