use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Local, Utc};
use tracing::{debug, warn};

use super::{degrade, require_text, CategoryStore};
use crate::error::{Result, StoreError};
use crate::filter::{filter_tasks, sort_newest_first, TaskFilter};
use crate::models::{NewTask, Priority, Task, TaskPatch};
use crate::stats::{self, DashboardStats, Progress};
use crate::storage::{Record, Repository};

/// Authoritative task collection.
///
/// Mutations are serialized through an internal lock and keep the owning
/// categories' task counts in step. A mutation moves the counts first and
/// then writes the task; if a later step fails the earlier ones are taken
/// back, so a failed call leaves tasks and counts as they were.
///
/// Queries come in two flavours: `try_*` returns backend failures, the plain
/// form degrades to an empty result.
pub struct TaskStore {
    repo: Arc<dyn Repository<Task>>,
    categories: Arc<CategoryStore>,
    writes: Mutex<()>,
}

impl TaskStore {
    pub fn new(repo: Arc<dyn Repository<Task>>, categories: Arc<CategoryStore>) -> Self {
        Self {
            repo,
            categories,
            writes: Mutex::new(()),
        }
    }

    /// Tasks matching `filter`, newest first.
    ///
    /// Degrades to an empty list when the backend is unavailable; callers that
    /// must tell "no tasks" from "backend down" use [`TaskStore::try_get_all`].
    pub fn get_all(&self, filter: Option<&TaskFilter>) -> Vec<Task> {
        degrade("task.get_all", self.try_get_all(filter))
    }

    pub fn try_get_all(&self, filter: Option<&TaskFilter>) -> Result<Vec<Task>> {
        let mut tasks = self.repo.list()?;
        sort_newest_first(&mut tasks);
        Ok(match filter {
            Some(filter) if !filter.is_empty() => filter_tasks(&tasks, filter),
            _ => tasks,
        })
    }

    pub fn get_by_category(&self, category_id: i64) -> Vec<Task> {
        self.get_all(Some(&TaskFilter::new().category(category_id)))
    }

    pub fn get_by_priority(&self, priority: Priority) -> Vec<Task> {
        self.get_all(Some(&TaskFilter::new().priority(priority)))
    }

    pub fn search(&self, query: &str) -> Vec<Task> {
        self.get_all(Some(&TaskFilter::new().search(query)))
    }

    pub fn get_by_id(&self, id: i64) -> Result<Task> {
        self.repo
            .get(id)?
            .ok_or_else(|| StoreError::not_found(Task::ENTITY, id))
    }

    pub fn create(&self, input: NewTask) -> Result<Task> {
        let title = require_text("task title", &input.title)?;
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.require_category(input.category_id)?;

        let counted = self.categories.adjust_task_count(input.category_id, 1)?;
        let inserted = self.repo.insert(Task {
            id: 0,
            title,
            description: input.description,
            priority: input.priority,
            category_id: input.category_id,
            due_date: input.due_date,
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
            tags: input.tags,
        });
        let task = match inserted {
            Ok(task) => task,
            Err(err) => {
                self.revert_counts(&[(input.category_id, counted)]);
                return Err(err);
            }
        };

        debug!(task_id = task.id, category_id = task.category_id, "created task");
        Ok(task)
    }

    pub fn update(&self, id: i64, patch: TaskPatch) -> Result<Task> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let before = self.get_by_id(id)?;
        let mut task = before.clone();

        if let Some(title) = patch.title {
            task.title = require_text("task title", &title)?;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(category_id) = patch.category_id {
            if category_id != before.category_id {
                self.require_category(category_id)?;
            }
            task.category_id = category_id;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(completed) = patch.completed {
            task.set_completed(completed, Utc::now());
        }

        let mut counted = Vec::new();
        if task.category_id != before.category_id {
            counted.push((
                before.category_id,
                self.categories.adjust_task_count(before.category_id, -1)?,
            ));
            match self.categories.adjust_task_count(task.category_id, 1) {
                Ok(applied) => counted.push((task.category_id, applied)),
                Err(err) => {
                    self.revert_counts(&counted);
                    return Err(err);
                }
            }
        }
        if let Err(err) = self.store(&task) {
            self.revert_counts(&counted);
            return Err(err);
        }

        debug!(task_id = id, "updated task");
        Ok(task)
    }

    /// Flip the completion flag. Toggling twice restores the original task.
    pub fn toggle_complete(&self, id: i64) -> Result<Task> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut task = self.get_by_id(id)?;
        task.set_completed(!task.completed, Utc::now());
        self.store(&task)?;

        debug!(task_id = id, completed = task.completed, "toggled task");
        Ok(task)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let task = self.get_by_id(id)?;
        let counted = [(
            task.category_id,
            self.categories.adjust_task_count(task.category_id, -1)?,
        )];
        let removed = match self.repo.remove(id) {
            Ok(removed) => removed,
            Err(err) => {
                self.revert_counts(&counted);
                return Err(err);
            }
        };
        if removed.is_none() {
            self.revert_counts(&counted);
            return Err(StoreError::not_found(Task::ENTITY, id));
        }

        debug!(task_id = id, "deleted task");
        Ok(true)
    }

    /// Rebuild every category's task count from the current tasks.
    pub fn recount_categories(&self) -> Result<()> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let tasks = self.repo.list()?;
        self.categories.recount(&tasks)
    }

    /// Completed/total for tasks created today (local time).
    /// Degrades to `{0, 0}` when the backend is unavailable.
    pub fn todays_progress(&self) -> Progress {
        degrade("task.todays_progress", self.try_todays_progress())
    }

    pub fn try_todays_progress(&self) -> Result<Progress> {
        Ok(stats::todays_progress(&self.repo.list()?, &Local::now()))
    }

    /// Rounded completion percentage over the last seven days.
    /// Degrades to `0` when the backend is unavailable.
    pub fn weekly_completion_rate(&self) -> u32 {
        degrade("task.weekly_completion_rate", self.try_weekly_completion_rate())
    }

    pub fn try_weekly_completion_rate(&self) -> Result<u32> {
        Ok(stats::weekly_completion_rate(&self.repo.list()?, Utc::now()))
    }

    /// Open tasks past their due date, newest first.
    /// Degrades to an empty list when the backend is unavailable.
    pub fn overdue_tasks(&self) -> Vec<Task> {
        degrade("task.overdue_tasks", self.try_overdue_tasks())
    }

    pub fn try_overdue_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks = self.repo.list()?;
        sort_newest_first(&mut tasks);
        Ok(stats::overdue_tasks(&tasks, Utc::now()))
    }

    /// All dashboard figures from a single snapshot.
    /// Degrades to zeroes when the backend is unavailable.
    pub fn dashboard(&self) -> DashboardStats {
        degrade("task.dashboard", self.try_dashboard())
    }

    pub fn try_dashboard(&self) -> Result<DashboardStats> {
        Ok(stats::dashboard(&self.repo.list()?, &Local::now()))
    }

    fn require_category(&self, category_id: i64) -> Result<()> {
        match self.categories.get_by_id(category_id) {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Err(StoreError::validation(format!(
                "category {} does not exist",
                category_id
            ))),
            Err(err) => Err(err),
        }
    }

    /// Take back count changes made earlier in a mutation that then failed.
    fn revert_counts(&self, counted: &[(i64, i64)]) {
        for &(category_id, applied) in counted.iter().rev() {
            if applied == 0 {
                continue;
            }
            if let Err(err) = self.categories.adjust_task_count(category_id, -applied) {
                warn!(category_id, error = %err, "could not revert task count, recount needed");
            }
        }
    }

    fn store(&self, task: &Task) -> Result<()> {
        if self.repo.replace(task)? {
            Ok(())
        } else {
            Err(StoreError::not_found(Task::ENTITY, task.id))
        }
    }
}
