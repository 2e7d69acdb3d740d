use clap::Parser;
mod commands;
use commands::cli;
use parawave_core::config::{AppConfig, LoggingConfig};
use parawave_core::error::{CliError, ExecutorError};
use parawave_plugins::factory;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = load_config(&args).map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    match args.command {
        cli::Commands::Run(run_args) => commands::run::run(run_args, cfg).await,
        cli::Commands::Plan(plan_args) => commands::plan::plan(plan_args),
        cli::Commands::Strategies => {
            for strategy in factory::synthesis_strategies() {
                println!("{:<22} {}", strategy.name(), strategy.description());
            }
            Ok(0)
        }
    }
}

fn load_config(args: &cli::Args) -> anyhow::Result<AppConfig> {
    match &args.config {
        Some(path) => parawave_core::config::load_from_path(path),
        None => parawave_core::config::load_default(),
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: run completed, every task succeeded
    // 1: run finished with failures or partial (returned as a normal exit code)
    // 2: review required or speedup target missed (normal exit code)
    // 11: config error
    // 20: IO error
    // 30: plan error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Executor(ee) => match ee {
            ee if ee.is_plan_error() => 30,
            ExecutorError::InvalidConfig(_) => 11,
            ExecutorError::Io(_) => 20,
            _ => 50,
        },
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("parawave"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("parawave.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
