//! Derived task views: filtering by category, priority and free-text search.
//!
//! Everything here is a pure function over a snapshot. Results are fresh
//! vectors and keep the input order, so the same snapshot and filter always
//! produce the same list.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::models::{Priority, Task};

/// Predicate set applied to a task snapshot.
///
/// Every dimension that is set must match (logical AND); an unset dimension
/// places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub category_id: Option<i64>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.priority.is_none() && self.needle().is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.matches_with(task, self.needle().as_deref())
    }

    /// Lowercased search text; an empty query is no constraint
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .filter(|query| !query.is_empty())
            .map(str::to_lowercase)
    }

    fn matches_with(&self, task: &Task, needle: Option<&str>) -> bool {
        if self.category_id.is_some_and(|id| task.category_id != id) {
            return false;
        }
        if self.priority.is_some_and(|p| task.priority != p) {
            return false;
        }
        match needle {
            Some(needle) => {
                task.title.to_lowercase().contains(needle)
                    || task.description.to_lowercase().contains(needle)
            }
            None => true,
        }
    }
}

/// Keep the tasks matching `filter`, in their original order.
pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    let needle = filter.needle();
    tasks
        .iter()
        .filter(|task| filter.matches_with(task, needle.as_deref()))
        .cloned()
        .collect()
}

/// Newest first by `created_at`, then by id for tasks created in the same instant.
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| Reverse((task.created_at, task.id)));
}

/// Split a view into (active, completed), each keeping its relative order.
pub fn partition_by_completion(tasks: Vec<Task>) -> (Vec<Task>, Vec<Task>) {
    let (completed, active): (Vec<Task>, Vec<Task>) =
        tasks.into_iter().partition(|task| task.completed);
    (active, completed)
}
