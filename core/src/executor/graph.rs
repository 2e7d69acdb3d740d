use std::collections::HashMap;
use std::time::Duration;

use crate::error::ExecutorError;
use crate::executor::types::{ExecutionPlan, TaskLike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Task dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct TaskGraph<T: TaskLike> {
    /// Task nodes: task_id -> Task
    pub nodes: HashMap<String, T>,

    /// Dependency edges: task_id -> list of dependencies
    pub edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> list of tasks that depend on it
    pub reverse_edges: HashMap<String, Vec<String>>,

    /// Declaration order; breaks ties everywhere ordering matters.
    insertion_order: Vec<String>,
}

impl<T: TaskLike> TaskGraph<T> {
    /// Construct task graph from task list
    pub fn from_tasks(tasks: &[T]) -> Result<Self, ExecutorError> {
        let mut nodes = HashMap::new();
        let mut edges = HashMap::new();
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut insertion_order = Vec::new();

        for task in tasks {
            if nodes.contains_key(task.id()) {
                return Err(ExecutorError::DuplicateTaskId(task.id().to_string()));
            }

            let task_id = task.id().to_string();
            let dependencies = task.dependencies().to_vec();

            nodes.insert(task_id.clone(), task.clone());
            edges.insert(task_id.clone(), dependencies.clone());
            insertion_order.push(task_id.clone());

            for dep in dependencies {
                reverse_edges.entry(dep).or_default().push(task_id.clone());
            }
        }

        Ok(Self {
            nodes,
            edges,
            reverse_edges,
            insertion_order,
        })
    }

    /// Validate dependency relationships: every dependency exists, no cycles.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        for task_id in &self.insertion_order {
            for dep in self.dependencies_of(task_id) {
                if !self.nodes.contains_key(dep) {
                    return Err(ExecutorError::DependencyNotFound {
                        task_id: task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(ExecutorError::CircularDependency { cycle });
        }

        Ok(())
    }

    /// Validate, then layer the graph into waves.
    pub fn build_plan(&self) -> Result<ExecutionPlan, ExecutorError> {
        self.validate()?;
        let stages = self.topological_sort()?;
        Ok(ExecutionPlan::from_stages(stages))
    }

    /// Topological sort using Kahn's algorithm
    ///
    /// Returns execution stages where tasks in the same stage can run in parallel.
    /// Each stage lists its tasks in declaration order.
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn topological_sort(&self) -> Result<Vec<Vec<String>>, ExecutorError> {
        // edges[A] = [B, C] means A depends on B and C, so A's in-degree is 2
        let mut in_degree: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), self.dependencies_of(id).len()))
            .collect();

        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut current_stage: Vec<String> = self
            .insertion_order
            .iter()
            .filter(|id| in_degree.get(id.as_str()) == Some(&0))
            .cloned()
            .collect();

        let mut processed = 0;

        while !current_stage.is_empty() {
            processed += current_stage.len();

            let mut next_stage = Vec::new();
            for task_id in &current_stage {
                for dependent in self.dependents_of(task_id) {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            next_stage.push(dependent.clone());
                        }
                    }
                }
            }

            next_stage.sort_by_key(|id| self.position(id));
            stages.push(std::mem::replace(&mut current_stage, next_stage));
        }

        if processed != self.nodes.len() {
            let stuck = self
                .insertion_order
                .iter()
                .filter(|id| in_degree.get(id.as_str()).copied().unwrap_or(0) > 0)
                .cloned()
                .collect();
            return Err(ExecutorError::CircularDependency { cycle: stuck });
        }

        Ok(stages)
    }

    /// Longest dependency chain by accumulated weight.
    ///
    /// Returns the chain's total weight and its task ids, root first. Ties go
    /// to the task declared first. The graph must be acyclic.
    pub fn critical_path<F>(&self, weight: F) -> Result<(Duration, Vec<String>), ExecutorError>
    where
        F: Fn(&T) -> Duration,
    {
        let stages = self.topological_sort()?;
        let mut best: HashMap<&str, (Duration, Option<&str>)> = HashMap::new();

        for task_id in stages.iter().flatten() {
            let own = self.nodes.get(task_id).map(&weight).unwrap_or_default();
            let mut from: (Duration, Option<&str>) = (Duration::ZERO, None);
            for dep in self.dependencies_of(task_id) {
                if let Some((total, _)) = best.get(dep.as_str()) {
                    if *total > from.0 {
                        from = (*total, Some(dep.as_str()));
                    }
                }
            }
            if let Some((id, _)) = self.nodes.get_key_value(task_id) {
                best.insert(id.as_str(), (from.0.saturating_add(own), from.1));
            }
        }

        let mut tail: Option<&str> = None;
        let mut longest = Duration::ZERO;
        for id in &self.insertion_order {
            if let Some((total, _)) = best.get(id.as_str()) {
                if tail.is_none() || *total > longest {
                    longest = *total;
                    tail = Some(id.as_str());
                }
            }
        }

        let mut path = Vec::new();
        while let Some(id) = tail {
            path.push(id.to_string());
            tail = best.get(id).and_then(|(_, prev)| *prev);
        }
        path.reverse();
        Ok((longest, path))
    }

    pub fn dependencies_of(&self, task_id: &str) -> &[String] {
        self.edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.reverse_edges.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, task_id: &str) -> usize {
        self.insertion_order
            .iter()
            .position(|k| k == task_id)
            .unwrap_or(usize::MAX)
    }

    /// Detect circular dependencies using DFS with a visiting marker.
    ///
    /// Roots and dependencies are walked in declaration order so the reported
    /// cycle is stable. The returned path starts and ends with the same id.
    fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();

        for task_id in &self.insertion_order {
            if !marks.contains_key(task_id.as_str()) {
                if let Some(cycle) = self.dfs_cycle(task_id, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        stack.push(node);

        for dep in self.dependencies_of(node) {
            match marks.get(dep.as_str()) {
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|x| *x == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = self.dfs_cycle(dep, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TaskSpec;

    fn task(id: &str, deps: &[&str]) -> TaskSpec {
        TaskSpec::new(id, "").depends_on(deps.iter().copied())
    }

    #[test]
    fn test_independent_tasks_share_one_wave() {
        let tasks = vec![task("security", &[]), task("perf", &[]), task("ux", &[])];
        let plan = TaskGraph::from_tasks(&tasks).unwrap().build_plan().unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.waves[0].task_ids, vec!["security", "perf", "ux"]);
    }

    #[test]
    fn test_wave_index_exceeds_dependencies() {
        let tasks = vec![
            task("report", &["merge"]),
            task("a", &[]),
            task("merge", &["a", "b"]),
            task("b", &["a"]),
            task("c", &[]),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let plan = graph.build_plan().unwrap();

        assert_eq!(plan.total_tasks(), tasks.len());
        for t in &tasks {
            let own = plan.wave_of(&t.id).unwrap();
            for dep in &t.dependencies {
                assert!(own > plan.wave_of(dep).unwrap(), "{} after {}", t.id, dep);
            }
        }
        assert_eq!(plan.waves[0].task_ids, vec!["a", "c"]);
        assert_eq!(plan.waves[1].task_ids, vec!["b"]);
        assert_eq!(plan.waves[2].task_ids, vec!["merge"]);
        assert_eq!(plan.waves[3].task_ids, vec!["report"]);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let tasks = vec![
            task("root", &[]),
            task("z", &["root"]),
            task("m", &["root"]),
            task("a", &["root"]),
        ];
        let plan = TaskGraph::from_tasks(&tasks).unwrap().build_plan().unwrap();
        assert_eq!(plan.waves[1].task_ids, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_cycle_is_reported_with_participants() {
        let tasks = vec![task("x", &[]), task("a", &["b"]), task("b", &["c"]), task("c", &["a"])];
        let err = TaskGraph::from_tasks(&tasks).unwrap().build_plan().unwrap_err();
        match err {
            ExecutorError::CircularDependency { cycle } => {
                assert_eq!(cycle, vec!["a", "b", "c", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let tasks = vec![task("a", &["a"])];
        let err = TaskGraph::from_tasks(&tasks).unwrap().validate().unwrap_err();
        assert!(matches!(err, ExecutorError::CircularDependency { ref cycle } if cycle == &["a", "a"]));
    }

    #[test]
    fn test_missing_dependency() {
        let tasks = vec![task("a", &["ghost"])];
        let err = TaskGraph::from_tasks(&tasks).unwrap().validate().unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::DependencyNotFound { ref task_id, ref missing_dep }
                if task_id == "a" && missing_dep == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_id() {
        let tasks = vec![task("a", &[]), task("a", &[])];
        assert!(matches!(
            TaskGraph::from_tasks(&tasks),
            Err(ExecutorError::DuplicateTaskId(_))
        ));
    }

    #[test]
    fn test_critical_path_follows_heaviest_chain() {
        let secs = Duration::from_secs;
        let tasks = vec![
            TaskSpec::new("a", "").with_estimate(secs(10)),
            TaskSpec::new("b", "").with_estimate(secs(50)),
            TaskSpec::new("c", "").with_estimate(secs(5)).depends_on(["a"]),
            TaskSpec::new("d", "").with_estimate(secs(20)).depends_on(["b", "c"]),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let (total, path) = graph.critical_path(TaskSpec::estimated_duration).unwrap();
        assert_eq!(total, secs(70));
        assert_eq!(path, vec!["b", "d"]);
    }

    #[test]
    fn test_critical_path_saturates_huge_estimates() {
        let tasks = vec![
            TaskSpec::new("a", "").with_estimate(Duration::MAX),
            TaskSpec::new("b", "").with_estimate(Duration::MAX).depends_on(["a"]),
        ];
        let graph = TaskGraph::from_tasks(&tasks).unwrap();
        let (total, path) = graph.critical_path(TaskSpec::estimated_duration).unwrap();
        assert_eq!(total, Duration::MAX);
        assert_eq!(path, vec!["a", "b"]);
    }
}
