use std::io::Write;

use chrono::Local;
use parawave_core::executor::traits::{OutputRendererPlugin, RenderEvent};
use serde_json::{json, Value};

/// One JSON object per event on stdout (`v`, `event_type`, `ts`, `run_id`, ...).
pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        let mut value = json!({
            "v": 1,
            "event_type": event.kind(),
            "ts": ts,
            "run_id": event.run_id(),
        });
        let (task_id, metadata) = match event {
            RenderEvent::RunStart {
                total_tasks,
                total_waves,
                ..
            } => (
                None,
                json!({ "total_tasks": total_tasks, "total_waves": total_waves }),
            ),
            RenderEvent::Plan { waves, .. } => {
                let total_tasks: usize = waves.iter().map(|w| w.len()).sum();
                (None, json!({ "waves": waves, "total_tasks": total_tasks }))
            }
            RenderEvent::WaveStart { wave, task_ids, .. } => {
                (None, json!({ "wave": wave, "tasks": task_ids }))
            }
            RenderEvent::TaskStart {
                task_id,
                wave,
                attempt,
                ..
            } => (
                Some(task_id.clone()),
                json!({ "wave": wave, "attempt": attempt }),
            ),
            RenderEvent::TaskComplete { wave, result, .. } => (
                Some(result.task_id.clone()),
                json!({
                    "wave": wave,
                    "status": result.status,
                    "attempt": result.attempt,
                    "duration_ms": result.duration_ms,
                    "error": result.error,
                    "success": result.status.is_success(),
                }),
            ),
            RenderEvent::Retry {
                task_id,
                next_attempt,
                delay_ms,
                ..
            } => (
                Some(task_id.clone()),
                json!({ "next_attempt": next_attempt, "delay_ms": delay_ms }),
            ),
            RenderEvent::Recovery {
                wave,
                action,
                task_ids,
                ..
            } => (
                None,
                json!({ "wave": wave, "action": action, "tasks": task_ids }),
            ),
            RenderEvent::WaveEnd {
                wave,
                succeeded,
                failed,
                conflicts,
                ..
            } => (
                None,
                json!({
                    "wave": wave,
                    "succeeded": succeeded,
                    "failed": failed,
                    "conflicts": conflicts,
                }),
            ),
            RenderEvent::RunEnd { summary, .. } => (None, json!(summary)),
        };

        if let Some(obj) = value.as_object_mut() {
            if let Some(task_id) = task_id {
                obj.insert("task_id".to_string(), Value::String(task_id));
            }
            obj.insert("metadata".to_string(), metadata);
        }
        value
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        match line {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", line);
                let _ = out.flush();
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize render event"),
        }
    }
}
