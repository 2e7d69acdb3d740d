use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use parawave_core::config::{FailureRecoveryPolicy, OptimizationLevel};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    #[value(name = "abort_all")]
    AbortAll,
    #[value(name = "continue_others")]
    ContinueOthers,
    #[value(name = "retry_failed")]
    RetryFailed,
}

impl From<PolicyArg> for FailureRecoveryPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::AbortAll => Self::AbortAll,
            PolicyArg::ContinueOthers => Self::ContinueOthers,
            PolicyArg::RetryFailed => Self::RetryFailed,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationArg {
    Conservative,
    Balanced,
    Aggressive,
}

impl From<OptimizationArg> for OptimizationLevel {
    fn from(o: OptimizationArg) -> Self {
        match o {
            OptimizationArg::Conservative => Self::Conservative,
            OptimizationArg::Balanced => Self::Balanced,
            OptimizationArg::Aggressive => Self::Aggressive,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsFormat {
    Text,
    Jsonl,
    None,
}

impl EventsFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Jsonl => "jsonl",
            Self::None => "none",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "parawave", version, about = "Run task catalogs as parallel waves and synthesize the results")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ~/.parawave/config.toml, then ./parawave.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Task catalog (.toml or .json).
    #[arg(long)]
    pub catalog: PathBuf,

    /// Tasks allowed to run at once within a wave (1-16).
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    #[arg(long, value_enum)]
    pub optimization: Option<OptimizationArg>,

    /// Synthesis strategy name (see `parawave strategies`).
    #[arg(long)]
    pub strategy: Option<String>,

    #[arg(long)]
    pub min_speedup: Option<f64>,

    /// Declared sequential baseline; defaults to the sum of task estimates.
    #[arg(long)]
    pub baseline_secs: Option<u64>,

    /// Timeout for tasks that declare none.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
    pub format: ReportFormat,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Lifecycle events on stderr (text) or stdout (jsonl).
    #[arg(long, value_enum, default_value_t = EventsFormat::Text)]
    pub events: EventsFormat,

    /// Serve recorded outputs from this file instead of the configured runner.
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Show progress bars on stderr.
    #[arg(long)]
    pub progress: bool,

    #[arg(long)]
    pub ascii: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long)]
    pub catalog: PathBuf,

    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a catalog and print the report.
    Run(RunArgs),
    /// Validate a catalog and show its waves without running anything.
    Plan(PlanArgs),
    /// List the available synthesis strategies.
    Strategies,
}
