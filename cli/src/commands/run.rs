use std::sync::Arc;

use parawave_core::catalog::TaskCatalog;
use parawave_core::config::AppConfig;
use parawave_core::error::CliError;
use parawave_core::executor::{ExecutionEngine, ExecutionOpts, ProgressMonitor, TaskRunner};
use parawave_core::report::RunReport;
use parawave_plugins::factory;
use parawave_plugins::runner::ReplayRunnerPlugin;
use tokio_util::sync::CancellationToken;

use super::cli::RunArgs;

/// Flags win over config file and environment.
pub fn apply_overrides(args: &RunArgs, cfg: &mut AppConfig) {
    if let Some(n) = args.max_concurrency {
        cfg.run.max_concurrent_agents = n;
    }
    if let Some(p) = args.policy {
        cfg.run.failure_recovery = p.into();
    }
    if let Some(o) = args.optimization {
        cfg.run.optimization_level = o.into();
    }
    if let Some(s) = &args.strategy {
        cfg.run.synthesis_strategy = s.clone();
    }
    if let Some(r) = args.min_speedup {
        cfg.run.minimum_speedup_ratio = r;
    }
    if let Some(b) = args.baseline_secs {
        cfg.run.declared_baseline_secs = Some(b);
    }
    if let Some(t) = args.timeout_secs {
        cfg.run.default_timeout_secs = Some(t);
    }
}

/// 0 clean, 1 failures or partial, 2 clean run that needs review or missed
/// its speedup target.
pub fn exit_code_for_report(report: &RunReport) -> i32 {
    if !report.all_succeeded() {
        1
    } else if report.review_required || !report.performance.passed {
        2
    } else {
        0
    }
}

pub async fn run(args: RunArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    apply_overrides(&args, &mut cfg);
    cfg.validate()?;

    let catalog = TaskCatalog::load(&args.catalog)?;
    let runner: Arc<dyn TaskRunner> = match &args.replay {
        Some(path) => Arc::new(ReplayRunnerPlugin::from_file(path)?),
        None => factory::build_runner(&cfg)?,
    };
    let synthesis = factory::build_synthesis(&cfg.run.synthesis_strategy)?;
    let retry = factory::build_retry(&cfg)?;
    let report_renderer = factory::build_report_renderer(args.format.as_str())?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let mut builder = ExecutionEngine::builder(ExecutionOpts::from_config(&cfg))
        .with_runner(runner)
        .with_synthesis(synthesis)
        .with_retry_strategy(retry)
        .with_cancellation(cancel);
    if let Some(renderer) = factory::build_renderer(args.events.as_str(), args.ascii) {
        builder = builder.with_renderer(renderer);
    }
    if args.progress {
        let enabled = atty::is(atty::Stream::Stderr);
        builder = builder.with_renderer(Arc::new(ProgressMonitor::new(catalog.len(), enabled)));
    }

    let report = builder.build()?.run(&catalog).await?;
    let rendered = report_renderer.render(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            tracing::info!(path = %path.display(), format = report_renderer.name(), "report written");
        }
        None => println!("{rendered}"),
    }

    Ok(exit_code_for_report(&report))
}
