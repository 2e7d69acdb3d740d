use parawave_core::executor::traits::{OutputRendererPlugin, RenderEvent};

/// Human-readable event lines on stderr; stdout is left for the report.
pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                run_id,
                total_tasks,
                total_waves,
            } => format!(
                "RUN START {} (tasks: {}, waves: {})",
                run_id, total_tasks, total_waves
            ),
            RenderEvent::Plan { run_id, waves } => {
                let mut out = format!("PLAN {}:", run_id);
                for (idx, wave) in waves.iter().enumerate() {
                    out.push_str(&format!("\n  wave {}: {}", idx, wave.join(", ")));
                }
                out
            }
            RenderEvent::WaveStart {
                run_id,
                wave,
                task_ids,
            } => format!(
                "WAVE START {} (wave {}, tasks: {})",
                run_id,
                wave,
                task_ids.len()
            ),
            RenderEvent::TaskStart {
                run_id,
                task_id,
                wave,
                attempt,
            } => format!(
                "TASK START {} (wave {}, task {}, attempt {})",
                run_id, wave, task_id, attempt
            ),
            RenderEvent::TaskComplete { run_id, wave, result } => {
                let status = match (result.status.is_success(), self.ascii_only) {
                    (true, true) => "OK",
                    (true, false) => "SUCCESS",
                    (false, true) => "FAIL",
                    (false, false) => result.status.as_str(),
                };
                let mut line = format!(
                    "TASK END {} (wave {}, task {}, status {}, attempt {}, duration {}ms)",
                    run_id, wave, result.task_id, status, result.attempt, result.duration_ms
                );
                if let Some(err) = &result.error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            RenderEvent::Retry {
                run_id,
                task_id,
                next_attempt,
                delay_ms,
            } => format!(
                "TASK RETRY {} (task {}, attempt {} in {}ms)",
                run_id, task_id, next_attempt, delay_ms
            ),
            RenderEvent::Recovery {
                run_id,
                wave,
                action,
                task_ids,
            } => format!(
                "RECOVERY {} (wave {}, {}: {})",
                run_id,
                wave,
                action,
                task_ids.join(", ")
            ),
            RenderEvent::WaveEnd {
                run_id,
                wave,
                succeeded,
                failed,
                conflicts,
            } => format!(
                "WAVE END {} (wave {}, succeeded {}, failed {}, conflicts {})",
                run_id, wave, succeeded, failed, conflicts
            ),
            RenderEvent::RunEnd { run_id, summary } => format!(
                "RUN END {} ({}, succeeded {}/{}, failed {}, cancelled {}, duration {}ms, speedup {:.2}x)",
                run_id,
                summary.status,
                summary.succeeded,
                summary.total_tasks,
                summary.failed,
                summary.cancelled,
                summary.duration_ms,
                summary.speedup_ratio
            ),
        }
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        eprintln!("{}", self.format_event(event));
    }
}
