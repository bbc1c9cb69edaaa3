use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::{degrade, require_text};
use crate::error::{Result, StoreError};
use crate::models::{Category, CategoryPatch, NewCategory, Task};
use crate::storage::{Record, Repository};

/// Label shown for tasks whose category no longer exists
pub const NO_CATEGORY: &str = "No Category";

/// Categories and their cached task counts
pub struct CategoryStore {
    repo: Arc<dyn Repository<Category>>,
    writes: Mutex<()>,
}

impl CategoryStore {
    pub fn new(repo: Arc<dyn Repository<Category>>) -> Self {
        Self {
            repo,
            writes: Mutex::new(()),
        }
    }

    /// All categories by name. Degrades to an empty list when the backend is
    /// unavailable; use [`CategoryStore::try_get_all`] to see the failure.
    pub fn get_all(&self) -> Vec<Category> {
        degrade("category.get_all", self.try_get_all())
    }

    pub fn try_get_all(&self) -> Result<Vec<Category>> {
        let mut categories = self.repo.list()?;
        categories.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        Ok(categories)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Category> {
        self.repo
            .get(id)?
            .ok_or_else(|| StoreError::not_found(Category::ENTITY, id))
    }

    pub fn create(&self, input: NewCategory) -> Result<Category> {
        let name = require_text("category name", &input.name)?;
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);

        let category = self.repo.insert(Category {
            id: 0,
            name,
            color: input.color,
            task_count: 0,
        })?;
        debug!(category_id = category.id, "created category");
        Ok(category)
    }

    pub fn update(&self, id: i64, patch: CategoryPatch) -> Result<Category> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut category = self.get_by_id(id)?;

        if let Some(name) = patch.name {
            category.name = require_text("category name", &name)?;
        }
        if let Some(color) = patch.color {
            category.color = color;
        }

        self.store(&category)?;
        debug!(category_id = id, "updated category");
        Ok(category)
    }

    /// Delete a category. Tasks that reference it keep their dangling id.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.repo
            .remove(id)?
            .ok_or_else(|| StoreError::not_found(Category::ENTITY, id))?;
        debug!(category_id = id, "deleted category");
        Ok(true)
    }

    /// Shift a category's cached task count by `delta`, never below zero.
    /// Returns the change actually applied, so a caller can take it back.
    ///
    /// Unknown ids are tolerated: tasks may point at deleted categories.
    pub fn adjust_task_count(&self, id: i64, delta: i64) -> Result<i64> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut category) = self.repo.get(id)? else {
            warn!(category_id = id, delta, "task count change for missing category ignored");
            return Ok(0);
        };

        let before = i64::from(category.task_count);
        let count = u32::try_from((before + delta).max(0)).unwrap_or(u32::MAX);
        if i64::from(count) == before {
            return Ok(0);
        }
        category.task_count = count;
        self.store(&category)?;
        Ok(i64::from(count) - before)
    }

    /// Recompute every category's task count from a full task snapshot.
    pub fn recount(&self, tasks: &[Task]) -> Result<()> {
        let mut counts: HashMap<i64, u32> = HashMap::new();
        for task in tasks {
            *counts.entry(task.category_id).or_default() += 1;
        }

        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        for mut category in self.repo.list()? {
            let count = counts.get(&category.id).copied().unwrap_or(0);
            if category.task_count != count {
                debug!(category_id = category.id, from = category.task_count, to = count, "recounted category");
                category.task_count = count;
                self.store(&category)?;
            }
        }
        Ok(())
    }

    fn store(&self, category: &Category) -> Result<()> {
        if self.repo.replace(category)? {
            Ok(())
        } else {
            Err(StoreError::not_found(Category::ENTITY, category.id))
        }
    }
}

/// Display name for `id`, falling back to [`NO_CATEGORY`] when unresolved.
pub fn category_name_or_default(categories: &[Category], id: i64) -> &str {
    categories
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.name.as_str())
        .unwrap_or(NO_CATEGORY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;

    fn store() -> CategoryStore {
        CategoryStore::new(Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn categories_list_by_name() {
        let store = store();
        store.create(NewCategory::new("work", "#f00")).unwrap();
        store.create(NewCategory::new("Errands", "#0f0")).unwrap();
        store.create(NewCategory::new("personal", "#00f")).unwrap();

        let names: Vec<_> = store.get_all().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Errands", "personal", "work"]);
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = store().create(NewCategory::new("  ", "#fff")).unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed(_)));
    }

    #[test]
    fn task_count_never_goes_negative() {
        let store = store();
        let category = store.create(NewCategory::new("Work", "#f00")).unwrap();
        store.adjust_task_count(category.id, 2).unwrap();
        store.adjust_task_count(category.id, -5).unwrap();
        assert_eq!(store.get_by_id(category.id).unwrap().task_count, 0);
    }

    #[test]
    fn adjusting_missing_category_is_a_no_op() {
        assert_eq!(store().adjust_task_count(12, 1).unwrap(), 0);
    }

    #[test]
    fn adjust_reports_the_applied_change() {
        let store = store();
        let category = store.create(NewCategory::new("Work", "#f00")).unwrap();
        assert_eq!(store.adjust_task_count(category.id, 2).unwrap(), 2);
        assert_eq!(store.adjust_task_count(category.id, -5).unwrap(), -2);
        assert_eq!(store.adjust_task_count(category.id, -1).unwrap(), 0);
    }

    #[test]
    fn delete_missing_category_is_not_found() {
        let err = store().delete(3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unresolved_category_gets_default_name() {
        let store = store();
        let work = store.create(NewCategory::new("Work", "#f00")).unwrap();
        let categories = store.get_all();
        assert_eq!(category_name_or_default(&categories, work.id), "Work");
        assert_eq!(category_name_or_default(&categories, 99), NO_CATEGORY);
    }
}
