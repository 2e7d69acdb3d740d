use parawave_core::catalog::{TaskCatalog, TaskSpec};
use parawave_core::error::CliError;
use parawave_core::executor::TaskGraph;

use super::cli::PlanArgs;

/// Validate the catalog and print its waves, critical path and the best
/// speedup any schedule could reach.
pub fn plan(args: PlanArgs) -> Result<i32, CliError> {
    let catalog = TaskCatalog::load(&args.catalog)?;
    let graph = TaskGraph::from_tasks(catalog.tasks())?;
    let plan = graph.build_plan()?;
    let (critical, path) = graph.critical_path(TaskSpec::estimated_duration)?;
    let sequential = catalog.sequential_estimate();
    let max_speedup = (critical.as_secs_f64() > 0.0).then(|| sequential.as_secs_f64() / critical.as_secs_f64());

    if args.json {
        let doc = serde_json::json!({
            "waves": plan.stages(),
            "critical_path": path,
            "critical_path_secs": critical.as_secs_f64(),
            "sequential_secs": sequential.as_secs_f64(),
            "theoretical_max_speedup": max_speedup,
        });
        let text = serde_json::to_string_pretty(&doc).map_err(|e| CliError::Command(e.to_string()))?;
        println!("{text}");
        return Ok(0);
    }

    println!("{} tasks in {} waves", plan.total_tasks(), plan.len());
    for wave in &plan.waves {
        println!("  wave {}: {}", wave.index, wave.task_ids.join(", "));
    }
    println!(
        "critical path: {} ({:.1}s)",
        path.join(" -> "),
        critical.as_secs_f64()
    );
    println!("sequential estimate: {:.1}s", sequential.as_secs_f64());
    if let Some(ratio) = max_speedup {
        println!("theoretical max speedup: {ratio:.2}x");
    }
    Ok(0)
}
