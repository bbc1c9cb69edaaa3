use std::cmp::Reverse;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::debug;

use super::{degrade, require_text};
use crate::error::{Result, StoreError};
use crate::models::{NewTemplate, Template, TemplatePatch};
use crate::storage::{Record, Repository};

/// Reusable task presets.
///
/// Applying a template is a read: callers take [`Template::initial_values`]
/// and create a task from it through the task store.
pub struct TemplateStore {
    repo: Arc<dyn Repository<Template>>,
    writes: Mutex<()>,
}

impl TemplateStore {
    pub fn new(repo: Arc<dyn Repository<Template>>) -> Self {
        Self {
            repo,
            writes: Mutex::new(()),
        }
    }

    /// Templates newest first. Degrades to an empty list when the backend is
    /// unavailable; [`TemplateStore::try_get_all`] reports the failure instead.
    pub fn get_all(&self) -> Vec<Template> {
        degrade("template.get_all", self.try_get_all())
    }

    pub fn try_get_all(&self) -> Result<Vec<Template>> {
        let mut templates = self.repo.list()?;
        templates.sort_by_key(|t| Reverse((t.created_at, t.id)));
        Ok(templates)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Template> {
        self.repo
            .get(id)?
            .ok_or_else(|| StoreError::not_found(Template::ENTITY, id))
    }

    pub fn create(&self, input: NewTemplate) -> Result<Template> {
        let name = require_text("template name", &input.name)?;
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);

        let template = self.repo.insert(Template {
            id: 0,
            name,
            title: input.title,
            description: input.description,
            priority: input.priority,
            category_id: input.category_id,
            due_date: input.due_date,
            tags: input.tags,
            created_at: Utc::now(),
        })?;
        debug!(template_id = template.id, "created template");
        Ok(template)
    }

    pub fn update(&self, id: i64, patch: TemplatePatch) -> Result<Template> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut template = self.get_by_id(id)?;

        if let Some(name) = patch.name {
            template.name = require_text("template name", &name)?;
        }
        if let Some(title) = patch.title {
            template.title = title;
        }
        if let Some(description) = patch.description {
            template.description = description;
        }
        if let Some(priority) = patch.priority {
            template.priority = priority;
        }
        if let Some(category_id) = patch.category_id {
            template.category_id = category_id;
        }
        if let Some(due_date) = patch.due_date {
            template.due_date = due_date;
        }
        if let Some(tags) = patch.tags {
            template.tags = tags;
        }

        if !self.repo.replace(&template)? {
            return Err(StoreError::not_found(Template::ENTITY, id));
        }
        debug!(template_id = id, "updated template");
        Ok(template)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let _writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.repo
            .remove(id)?
            .ok_or_else(|| StoreError::not_found(Template::ENTITY, id))?;
        debug!(template_id = id, "deleted template");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::storage::MemoryRepository;

    fn store() -> TemplateStore {
        TemplateStore::new(Arc::new(MemoryRepository::new()))
    }

    #[test]
    fn newest_template_comes_first() {
        let store = store();
        store.create(NewTemplate::new("first")).unwrap();
        store.create(NewTemplate::new("second")).unwrap();
        let names: Vec<_> = store.get_all().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn update_can_clear_optional_defaults() {
        let store = store();
        let template = store
            .create(NewTemplate {
                priority: Some(Priority::High),
                category_id: Some(3),
                ..NewTemplate::new("Standup")
            })
            .unwrap();

        let updated = store
            .update(
                template.id,
                TemplatePatch {
                    priority: Some(None),
                    title: Some(Some("Daily standup".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.priority, None);
        assert_eq!(updated.category_id, Some(3));
        assert_eq!(updated.title.as_deref(), Some("Daily standup"));
    }

    #[test]
    fn nameless_template_is_rejected() {
        let err = store().create(NewTemplate::new("")).unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed(_)));
    }

    #[test]
    fn missing_template_is_not_found() {
        let store = store();
        assert!(store.get_by_id(1).unwrap_err().is_not_found());
        assert!(store.delete(1).unwrap_err().is_not_found());
        assert!(store
            .update(1, TemplatePatch::default())
            .unwrap_err()
            .is_not_found());
    }
}
