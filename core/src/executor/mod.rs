//! Wave-based executor for task dependency graphs.
//!
//! ```text
//! TaskCatalog
//!   ↓
//! TaskGraph::from_tasks() → validate() (missing deps, cycles)
//!   ↓
//! TaskGraph::build_plan() → ExecutionPlan (waves)
//!   ↓
//! ExecutionEngine::run()
//!   per wave: run_wave() → RecoveryController::decide() → conflict::detect() → synthesize
//!   ↓
//! RunReport
//! ```

mod engine;
mod graph;
mod output;
mod progress;
mod recovery;
mod scheduler;
pub mod traits;
pub mod types;

pub use engine::{build_plan, ExecutionEngine, ExecutionEngineBuilder};
pub use graph::TaskGraph;
pub use output::EventBus;
pub use progress::ProgressMonitor;
pub use recovery::{RecoveryAction, RecoveryController};
pub use scheduler::{run_wave, TaskRequest, WaveOptions};
pub use traits::{OutputRendererPlugin, RenderEvent, RetryStrategyPlugin, RunSummary, TaskContext, TaskRunner};
pub use types::{ExecutionOpts, ExecutionPlan, TaskResult, TaskStatus, Wave, WaveResults};
