use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::traits::{OutputRendererPlugin, RenderEvent};

struct Bars {
    overall: ProgressBar,
    tasks: HashMap<String, ProgressBar>,
    /// Ids that reported at least one terminal attempt.
    reported: HashSet<String>,
}

/// Visual progress monitor for wave execution.
///
/// One overall bar plus a spinner per running task. Usable as a renderer, so
/// it is driven entirely by lifecycle events.
pub struct ProgressMonitor {
    multi: MultiProgress,
    bars: Mutex<Bars>,
    enabled: bool,
}

impl ProgressMonitor {
    /// `enabled` is false for machine-readable output or non-terminal stderr.
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = if enabled {
            let bar = multi.add(ProgressBar::new(total_tasks as u64));
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
            {
                bar.set_style(style.progress_chars("█▓▒░  "));
            }
            bar.set_message("Starting...");
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            multi,
            bars: Mutex::new(Bars {
                overall,
                tasks: HashMap::new(),
                reported: HashSet::new(),
            }),
            enabled,
        }
    }

    fn add_task(&self, task_id: &str, attempt: u32) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        if attempt > 1 {
            bar.set_message(format!("⏳ {task_id} (attempt {attempt})"));
        } else {
            bar.set_message(format!("⏳ {task_id}"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut bars) = self.bars.lock() {
            if let Some(old) = bars.tasks.insert(task_id.to_string(), bar) {
                old.finish_and_clear();
            }
        }
    }

    fn complete_task(&self, task_id: &str, status: &str, duration_ms: u64) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        if let Some(bar) = bars.tasks.remove(task_id) {
            let icon = if status == "succeeded" { "✅" } else { "❌" };
            bar.finish_with_message(format!("{icon} {task_id} {status} ({duration_ms}ms)"));
        }
        if bars.reported.insert(task_id.to_string()) {
            bars.overall.inc(1);
        }
    }

    fn set_message(&self, msg: String) {
        if let Ok(bars) = self.bars.lock() {
            bars.overall.set_message(msg);
        }
    }
}

impl OutputRendererPlugin for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn format(&self) -> &str {
        "tty"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        if !self.enabled {
            return;
        }
        match event {
            RenderEvent::WaveStart { wave, task_ids, .. } => {
                self.set_message(format!("Wave {} ({} tasks)", wave + 1, task_ids.len()));
            }
            RenderEvent::TaskStart {
                task_id, attempt, ..
            } => self.add_task(task_id, *attempt),
            RenderEvent::TaskComplete { result, .. } => {
                self.complete_task(&result.task_id, result.status.as_str(), result.duration_ms);
            }
            RenderEvent::RunEnd { summary, .. } => {
                if let Ok(mut bars) = self.bars.lock() {
                    for (_, bar) in bars.tasks.drain() {
                        bar.finish_and_clear();
                    }
                    let msg = if summary.failed == 0 && !summary.partial {
                        "✅ All tasks completed"
                    } else {
                        "❌ Run finished with failures"
                    };
                    bars.overall.finish_with_message(msg);
                }
            }
            _ => {}
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.tasks.drain() {
                bar.finish_and_clear();
            }
        }
    }
}
