use serde::{Deserialize, Serialize};

/// A maximal set of tasks with no unresolved dependencies among them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    pub index: usize,
    /// Declaration order within the catalog.
    pub task_ids: Vec<String>,
}

/// Ordered waves. Every task id appears in exactly one wave and always after
/// the waves of its dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub waves: Vec<Wave>,
}

impl ExecutionPlan {
    pub fn from_stages(stages: Vec<Vec<String>>) -> Self {
        let waves = stages
            .into_iter()
            .enumerate()
            .map(|(index, task_ids)| Wave { index, task_ids })
            .collect();
        Self { waves }
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn total_tasks(&self) -> usize {
        self.waves.iter().map(|w| w.task_ids.len()).sum()
    }

    pub fn widest_wave(&self) -> usize {
        self.waves.iter().map(|w| w.task_ids.len()).max().unwrap_or(0)
    }

    /// Wave index of a task, if planned.
    pub fn wave_of(&self, task_id: &str) -> Option<usize> {
        self.waves
            .iter()
            .find(|w| w.task_ids.iter().any(|id| id == task_id))
            .map(|w| w.index)
    }

    /// Every task id in plan order.
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.waves
            .iter()
            .flat_map(|w| w.task_ids.iter().map(String::as_str))
    }

    pub fn stages(&self) -> Vec<Vec<String>> {
        self.waves.iter().map(|w| w.task_ids.clone()).collect()
    }
}
