//! Task, category and template stores wired to a storage backend.

mod category;
mod task;
mod template;

pub use category::{category_name_or_default, CategoryStore, NO_CATEGORY};
pub use task::TaskStore;
pub use template::TemplateStore;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{BackendKind, StorageConfig};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Category, Task, Template};
use crate::storage::{MemoryRepository, Repository};

/// The three stores sharing one backend, constructed once and passed around
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<TaskStore>,
    pub categories: Arc<CategoryStore>,
    pub templates: Arc<TemplateStore>,
}

impl Stores {
    /// Build the stores on the backend selected in `config`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Memory => {
                info!("using in-memory storage");
                Ok(Self::in_memory())
            }
            BackendKind::Sqlite => {
                let path = config.get_database_path();
                info!(path = %path.display(), "using SQLite storage");
                let db = Arc::new(Database::new(&path)?);
                Ok(Self::from_backends(db.clone(), db.clone(), db))
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backends(
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryRepository::new()),
        )
    }

    pub fn from_backends(
        tasks: Arc<dyn Repository<Task>>,
        categories: Arc<dyn Repository<Category>>,
        templates: Arc<dyn Repository<Template>>,
    ) -> Self {
        let categories = Arc::new(CategoryStore::new(categories));
        Self {
            tasks: Arc::new(TaskStore::new(tasks, categories.clone())),
            categories,
            templates: Arc::new(TemplateStore::new(templates)),
        }
    }
}

/// Unwrap a query result, or log the failure and fall back to the empty value.
fn degrade<T: Default>(operation: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(operation, error = %err, "query failed, returning empty result");
            T::default()
        }
    }
}

/// Trimmed `value`, or a validation failure naming `field` when it is blank.
fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
