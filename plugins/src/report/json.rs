use parawave_core::error::ExecutorError;
use parawave_core::report::{ReportRenderer, RunReport};

/// Machine-readable report: the `RunReport` serialized as JSON.
pub struct JsonReportRenderer {
    pretty: bool,
}

impl JsonReportRenderer {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Default for JsonReportRenderer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReportRenderer for JsonReportRenderer {
    fn name(&self) -> &str {
        "json"
    }

    fn render(&self, report: &RunReport) -> Result<String, ExecutorError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        rendered.map_err(|e| ExecutorError::Render(e.to_string()))
    }
}
