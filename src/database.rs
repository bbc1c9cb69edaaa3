use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::error::StoreError;
use crate::models::{Category, Priority, Task, Template};
use crate::storage::Repository;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::CollaboratorUnavailable(err.to_string())
    }
}

const TASK_COLUMNS: &str =
    "id, title, description, priority, category_id, due_date, completed, created_at, completed_at, tags";
const CATEGORY_COLUMNS: &str = "id, name, color, task_count";
const TEMPLATE_COLUMNS: &str =
    "id, name, title, description, priority, category_id, due_date, tags, created_at";

/// SQLite-backed storage for tasks, categories and templates.
///
/// The connection sits behind a mutex; every write runs in its own transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db_path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory SQLite database
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS categories (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL,
                color           TEXT NOT NULL,
                task_count      INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id              INTEGER PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                priority        TEXT NOT NULL,
                category_id     INTEGER NOT NULL,
                due_date        TEXT,
                completed       INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                completed_at    TEXT,
                tags            TEXT
            );

            CREATE TABLE IF NOT EXISTS templates (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL,
                title           TEXT,
                description     TEXT,
                priority        TEXT,
                category_id     INTEGER,
                due_date        TEXT,
                tags            TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_category_id ON tasks(category_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            CREATE INDEX IF NOT EXISTS idx_categories_name ON categories(name);",
        )?;
        Ok(())
    }

    /// Next id for `table`: max + 1, or 1 for an empty table
    fn next_id(tx: &Transaction<'_>, table: &str) -> Result<i64, DatabaseError> {
        let next: i64 = tx.query_row(
            &format!("SELECT COALESCE(MAX(id), 0) + 1 FROM {table}"),
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    /// Helper function to map a row to a Task
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority: parse_priority(3, row.get(3)?)?,
            category_id: row.get(4)?,
            due_date: parse_optional_timestamp(5, row.get(5)?)?,
            completed: row.get::<_, i64>(6)? != 0,
            created_at: parse_timestamp(7, row.get(7)?)?,
            completed_at: parse_optional_timestamp(8, row.get(8)?)?,
            tags: row.get(9)?,
        })
    }

    /// Get all tasks in insertion (id) order
    pub fn get_all_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC"))?;
        let tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Get a single task by ID
    pub fn get_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Insert a task under the next free id and return the stored row
    pub fn insert_task(&self, task: &Task) -> Result<Task, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = Self::next_id(&tx, "tasks")?;
        tx.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            rusqlite::params![
                id,
                task.title,
                task.description,
                task.priority.as_str(),
                task.category_id,
                task.due_date.map(|d| d.to_rfc3339()),
                if task.completed { 1 } else { 0 },
                task.created_at.to_rfc3339(),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.tags,
            ],
        )?;
        tx.commit()?;
        Ok(Task { id, ..task.clone() })
    }

    /// Update an existing task; returns false if no row has its id
    pub fn update_task(&self, task: &Task) -> Result<bool, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, category_id = ?4,
             due_date = ?5, completed = ?6, created_at = ?7, completed_at = ?8, tags = ?9 WHERE id = ?10",
            rusqlite::params![
                task.title,
                task.description,
                task.priority.as_str(),
                task.category_id,
                task.due_date.map(|d| d.to_rfc3339()),
                if task.completed { 1 } else { 0 },
                task.created_at.to_rfc3339(),
                task.completed_at.map(|d| d.to_rfc3339()),
                task.tags,
                task.id
            ],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    /// Delete a task by ID, returning the removed row
    pub fn delete_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_task,
            )
            .optional()?;
        if existing.is_some() {
            tx.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
        }
        tx.commit()?;
        Ok(existing)
    }

    /// Helper function to map a row to a Category
    fn row_to_category(row: &rusqlite::Row) -> Result<Category, rusqlite::Error> {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            task_count: row.get(3)?,
        })
    }

    pub fn get_all_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id ASC"))?;
        let categories = stmt
            .query_map([], Self::row_to_category)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>, DatabaseError> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    pub fn insert_category(&self, category: &Category) -> Result<Category, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = Self::next_id(&tx, "categories")?;
        tx.execute(
            &format!("INSERT INTO categories ({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
            rusqlite::params![id, category.name, category.color, category.task_count],
        )?;
        tx.commit()?;
        Ok(Category {
            id,
            ..category.clone()
        })
    }

    pub fn update_category(&self, category: &Category) -> Result<bool, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE categories SET name = ?1, color = ?2, task_count = ?3 WHERE id = ?4",
            rusqlite::params![category.name, category.color, category.task_count, category.id],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    /// Delete a category. Tasks referencing it are left in place.
    pub fn delete_category(&self, id: i64) -> Result<Option<Category>, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_category,
            )
            .optional()?;
        if existing.is_some() {
            tx.execute("DELETE FROM categories WHERE id = ?1", rusqlite::params![id])?;
        }
        tx.commit()?;
        Ok(existing)
    }

    /// Helper function to map a row to a Template
    fn row_to_template(row: &rusqlite::Row) -> Result<Template, rusqlite::Error> {
        let priority = match row.get::<_, Option<String>>(4)? {
            Some(value) => Some(parse_priority(4, value)?),
            None => None,
        };
        Ok(Template {
            id: row.get(0)?,
            name: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            priority,
            category_id: row.get(5)?,
            due_date: parse_optional_timestamp(6, row.get(6)?)?,
            tags: row.get(7)?,
            created_at: parse_timestamp(8, row.get(8)?)?,
        })
    }

    pub fn get_all_templates(&self) -> Result<Vec<Template>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY id ASC"))?;
        let templates = stmt
            .query_map([], Self::row_to_template)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(templates)
    }

    pub fn get_template(&self, id: i64) -> Result<Option<Template>, DatabaseError> {
        let conn = self.conn()?;
        let template = conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_template,
            )
            .optional()?;
        Ok(template)
    }

    pub fn insert_template(&self, template: &Template) -> Result<Template, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = Self::next_id(&tx, "templates")?;
        tx.execute(
            &format!("INSERT INTO templates ({TEMPLATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            rusqlite::params![
                id,
                template.name,
                template.title,
                template.description,
                template.priority.map(|p| p.as_str()),
                template.category_id,
                template.due_date.map(|d| d.to_rfc3339()),
                template.tags,
                template.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(Template {
            id,
            ..template.clone()
        })
    }

    pub fn update_template(&self, template: &Template) -> Result<bool, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE templates SET name = ?1, title = ?2, description = ?3, priority = ?4,
             category_id = ?5, due_date = ?6, tags = ?7, created_at = ?8 WHERE id = ?9",
            rusqlite::params![
                template.name,
                template.title,
                template.description,
                template.priority.map(|p| p.as_str()),
                template.category_id,
                template.due_date.map(|d| d.to_rfc3339()),
                template.tags,
                template.created_at.to_rfc3339(),
                template.id
            ],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    pub fn delete_template(&self, id: i64) -> Result<Option<Template>, DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
                rusqlite::params![id],
                Self::row_to_template,
            )
            .optional()?;
        if existing.is_some() {
            tx.execute("DELETE FROM templates WHERE id = ?1", rusqlite::params![id])?;
        }
        tx.commit()?;
        Ok(existing)
    }
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, value: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn parse_optional_timestamp(
    column: usize,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|v| parse_timestamp(column, v)).transpose()
}

fn parse_priority(column: usize, value: String) -> Result<Priority, rusqlite::Error> {
    value.parse().map_err(|e| conversion_error(column, e))
}

impl Repository<Task> for Database {
    fn list(&self) -> crate::Result<Vec<Task>> {
        Ok(self.get_all_tasks()?)
    }

    fn get(&self, id: i64) -> crate::Result<Option<Task>> {
        Ok(self.get_task(id)?)
    }

    fn insert(&self, record: Task) -> crate::Result<Task> {
        Ok(self.insert_task(&record)?)
    }

    fn replace(&self, record: &Task) -> crate::Result<bool> {
        Ok(self.update_task(record)?)
    }

    fn remove(&self, id: i64) -> crate::Result<Option<Task>> {
        Ok(self.delete_task(id)?)
    }
}

impl Repository<Category> for Database {
    fn list(&self) -> crate::Result<Vec<Category>> {
        Ok(self.get_all_categories()?)
    }

    fn get(&self, id: i64) -> crate::Result<Option<Category>> {
        Ok(self.get_category(id)?)
    }

    fn insert(&self, record: Category) -> crate::Result<Category> {
        Ok(self.insert_category(&record)?)
    }

    fn replace(&self, record: &Category) -> crate::Result<bool> {
        Ok(self.update_category(record)?)
    }

    fn remove(&self, id: i64) -> crate::Result<Option<Category>> {
        Ok(self.delete_category(id)?)
    }
}

impl Repository<Template> for Database {
    fn list(&self) -> crate::Result<Vec<Template>> {
        Ok(self.get_all_templates()?)
    }

    fn get(&self, id: i64) -> crate::Result<Option<Template>> {
        Ok(self.get_template(id)?)
    }

    fn insert(&self, record: Template) -> crate::Result<Template> {
        Ok(self.insert_template(&record)?)
    }

    fn replace(&self, record: &Template) -> crate::Result<bool> {
        Ok(self.update_template(record)?)
    }

    fn remove(&self, id: i64) -> crate::Result<Option<Template>> {
        Ok(self.delete_template(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task() -> Task {
        Task {
            id: 0,
            title: "Renew passport".to_string(),
            description: "bring photos".to_string(),
            priority: Priority::High,
            category_id: 1,
            due_date: Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()),
            completed: false,
            created_at: Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
            completed_at: None,
            tags: Some("admin".to_string()),
        }
    }

    #[test]
    fn task_row_survives_a_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.insert_task(&sample_task()).unwrap();
        assert_eq!(stored.id, 1);
        assert_eq!(db.get_task(1).unwrap(), Some(stored));
    }

    #[test]
    fn ids_continue_from_the_current_maximum() {
        let db = Database::open_in_memory().unwrap();
        db.insert_task(&sample_task()).unwrap();
        db.insert_task(&sample_task()).unwrap();
        db.delete_task(2).unwrap();
        assert_eq!(db.insert_task(&sample_task()).unwrap().id, 2);
    }

    #[test]
    fn update_of_missing_row_reports_false() {
        let db = Database::open_in_memory().unwrap();
        let task = Task {
            id: 42,
            ..sample_task()
        };
        assert!(!db.update_task(&task).unwrap());
        assert!(db.delete_task(42).unwrap().is_none());
    }

    #[test]
    fn template_with_empty_defaults_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let template = Template {
            id: 0,
            name: "Blank".to_string(),
            title: None,
            description: None,
            priority: None,
            category_id: None,
            due_date: None,
            tags: None,
            created_at: Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
        };
        let stored = db.insert_template(&template).unwrap();
        assert_eq!(db.get_template(stored.id).unwrap(), Some(stored));
    }

    #[test]
    fn corrupt_priority_is_a_conversion_error() {
        let db = Database::open_in_memory().unwrap();
        db.insert_task(&sample_task()).unwrap();
        db.conn()
            .unwrap()
            .execute("UPDATE tasks SET priority = 'urgent'", [])
            .unwrap();
        assert!(db.get_task(1).is_err());
    }
}
