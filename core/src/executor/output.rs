use std::sync::Arc;

use super::traits::{OutputRendererPlugin, RenderEvent};

/// Fans lifecycle events out to every attached renderer.
///
/// With no renderer attached, events are written to `tracing` instead so a
/// headless run still leaves a trail in the logs.
#[derive(Clone, Default)]
pub struct EventBus {
    renderers: Vec<Arc<dyn OutputRendererPlugin>>,
}

impl EventBus {
    pub fn new(renderers: Vec<Arc<dyn OutputRendererPlugin>>) -> Self {
        Self { renderers }
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    pub fn emit(&self, event: RenderEvent) {
        if self.renderers.is_empty() {
            log_event(&event);
            return;
        }
        for renderer in &self.renderers {
            renderer.render(&event);
        }
    }
}

fn log_event(event: &RenderEvent) {
    match event {
        RenderEvent::RunStart {
            run_id,
            total_tasks,
            total_waves,
        } => tracing::info!(run_id = %run_id, total_tasks, total_waves, "run started"),
        RenderEvent::Plan { run_id, waves } => {
            for (i, wave) in waves.iter().enumerate() {
                tracing::debug!(run_id = %run_id, wave = i, tasks = %wave.join(","), "planned wave");
            }
        }
        RenderEvent::WaveStart {
            run_id,
            wave,
            task_ids,
        } => tracing::info!(run_id = %run_id, wave, tasks = task_ids.len(), "wave started"),
        RenderEvent::TaskStart {
            run_id,
            task_id,
            wave,
            attempt,
        } => tracing::debug!(run_id = %run_id, task_id = %task_id, wave, attempt, "task started"),
        RenderEvent::TaskComplete { run_id, wave, result } => tracing::info!(
            run_id = %run_id,
            task_id = %result.task_id,
            wave,
            status = %result.status,
            attempt = result.attempt,
            duration_ms = result.duration_ms,
            "task finished"
        ),
        RenderEvent::Retry {
            run_id,
            task_id,
            next_attempt,
            delay_ms,
        } => tracing::warn!(run_id = %run_id, task_id = %task_id, next_attempt, delay_ms, "retrying task"),
        RenderEvent::Recovery {
            run_id,
            wave,
            action,
            task_ids,
        } => tracing::warn!(run_id = %run_id, wave, action = %action, tasks = %task_ids.join(","), "recovery decision"),
        RenderEvent::WaveEnd {
            run_id,
            wave,
            succeeded,
            failed,
            conflicts,
        } => tracing::info!(run_id = %run_id, wave, succeeded, failed, conflicts, "wave finished"),
        RenderEvent::RunEnd { run_id, summary } => tracing::info!(
            run_id = %run_id,
            status = %summary.status,
            partial = summary.partial,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            speedup = summary.speedup_ratio,
            "run finished"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Collect(Mutex<Vec<&'static str>>);

    impl OutputRendererPlugin for Collect {
        fn name(&self) -> &str {
            "collect"
        }
        fn format(&self) -> &str {
            "test"
        }
        fn render(&self, event: &RenderEvent) {
            self.0.lock().unwrap().push(event.kind());
        }
    }

    #[test]
    fn test_bus_fans_out_to_every_renderer() {
        let a = Arc::new(Collect(Mutex::new(Vec::new())));
        let b = Arc::new(Collect(Mutex::new(Vec::new())));
        let bus = EventBus::new(vec![a.clone(), b.clone()]);

        bus.emit(RenderEvent::WaveStart {
            run_id: "r".into(),
            wave: 0,
            task_ids: vec!["t".into()],
        });

        assert_eq!(*a.0.lock().unwrap(), vec!["wave.start"]);
        assert_eq!(*b.0.lock().unwrap(), vec!["wave.start"]);
    }

    #[test]
    fn test_empty_bus_does_not_panic() {
        let bus = EventBus::default();
        assert!(bus.is_empty());
        bus.emit(RenderEvent::Plan {
            run_id: "r".into(),
            waves: vec![vec!["a".into()]],
        });
    }
}
