//! Task catalog: the submitted set of `TaskSpec` definitions.
//!
//! The catalog is pure data. It is loaded once per invocation, validated for
//! identity problems, and then handed to the dependency resolver unchanged.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

fn default_domain() -> String {
    "general".to_string()
}

fn default_retry_budget() -> u32 {
    2
}

/// One unit of analysis work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Domain tag, e.g. "security" or "performance".
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Ids of tasks that must complete before this one starts, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Estimated sequential duration, used for the performance baseline.
    #[serde(default)]
    pub estimated_secs: u64,

    /// Per-task timeout; the run default applies when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Opaque instruction handed to the runner as-is.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub instruction: serde_json::Value,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            domain: default_domain(),
            dependencies: Vec::new(),
            estimated_secs: 0,
            timeout_secs: None,
            retry_budget: default_retry_budget(),
            instruction: serde_json::Value::Null,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_estimate(mut self, estimate: Duration) -> Self {
        self.estimated_secs = estimate.as_secs();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn with_instruction(mut self, instruction: serde_json::Value) -> Self {
        self.instruction = instruction;
        self
    }

    pub fn estimated_duration(&self) -> Duration {
        Duration::from_secs(self.estimated_secs)
    }

    /// The task's own timeout, or `default` when none was declared.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

/// Ordered collection of task specs. Declaration order is significant: it
/// breaks ties inside a wave.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskCatalog {
    #[serde(default)]
    tasks: Vec<TaskSpec>,
}

impl TaskCatalog {
    pub fn new(tasks: Vec<TaskSpec>) -> Self {
        Self { tasks }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ExecutorError> {
        // Accept either `{"tasks": [...]}` or a bare array.
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| ExecutorError::Catalog(e.to_string()))?;
        let catalog = if value.is_array() {
            let tasks: Vec<TaskSpec> =
                serde_json::from_value(value).map_err(|e| ExecutorError::Catalog(e.to_string()))?;
            Self::new(tasks)
        } else {
            serde_json::from_value(value).map_err(|e| ExecutorError::Catalog(e.to_string()))?
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ExecutorError> {
        let catalog: Self = toml::from_str(s).map_err(|e| ExecutorError::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file; `.json` is parsed as JSON, everything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ExecutorError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Identity checks (no empty ids, no duplicates) and non-zero timeouts.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        let mut seen = HashSet::new();
        for (pos, task) in self.tasks.iter().enumerate() {
            if task.id.trim().is_empty() {
                return Err(ExecutorError::EmptyTaskId(pos));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ExecutorError::DuplicateTaskId(task.id.clone()));
            }
            if task.timeout_secs == Some(0) {
                return Err(ExecutorError::Catalog(format!(
                    "task '{}': timeout_secs must be greater than 0",
                    task.id
                )));
            }
        }
        Ok(())
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn index(&self) -> HashMap<&str, &TaskSpec> {
        self.tasks.iter().map(|t| (t.id.as_str(), t)).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Sum of every task's estimate: the fully sequential duration. Saturates
    /// at `Duration::MAX`.
    pub fn sequential_estimate(&self) -> Duration {
        self.tasks
            .iter()
            .map(TaskSpec::estimated_duration)
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}
