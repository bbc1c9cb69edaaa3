//! Storage collaborator boundary.
//!
//! The stores talk to persistence only through [`Repository`]. Two adapters
//! implement it: [`MemoryRepository`] keeps records in process memory and
//! [`crate::database::Database`] persists them in SQLite. Which one backs a
//! store is decided once, in [`crate::stores::Stores::open`].

mod memory;

pub use memory::MemoryRepository;

use crate::error::Result;
use crate::models::{Category, Task, Template};

/// An entity that lives in a repository under an integer id
pub trait Record: Clone + Send + Sync + 'static {
    /// Entity name used in error messages and logs
    const ENTITY: &'static str;

    fn id(&self) -> i64;

    fn with_id(self, id: i64) -> Self;
}

impl Record for Task {
    const ENTITY: &'static str = "task";

    fn id(&self) -> i64 {
        self.id
    }

    fn with_id(self, id: i64) -> Self {
        Task { id, ..self }
    }
}

impl Record for Category {
    const ENTITY: &'static str = "category";

    fn id(&self) -> i64 {
        self.id
    }

    fn with_id(self, id: i64) -> Self {
        Category { id, ..self }
    }
}

impl Record for Template {
    const ENTITY: &'static str = "template";

    fn id(&self) -> i64 {
        self.id
    }

    fn with_id(self, id: i64) -> Self {
        Template { id, ..self }
    }
}

/// CRUD contract every storage backend offers for one record type.
///
/// Each call is atomic with respect to readers: a concurrent `list` sees a
/// record either fully before or fully after a write.
pub trait Repository<R: Record>: Send + Sync {
    /// All records, in insertion order
    fn list(&self) -> Result<Vec<R>>;

    fn get(&self, id: i64) -> Result<Option<R>>;

    /// Store `record` under `max(existing ids) + 1` (or 1 when empty),
    /// ignoring whatever id it carried, and return the stored copy.
    fn insert(&self, record: R) -> Result<R>;

    /// Overwrite the record with the same id. Returns `false` if there is none.
    fn replace(&self, record: &R) -> Result<bool>;

    /// Remove a record, returning it if it existed
    fn remove(&self, id: i64) -> Result<Option<R>>;
}

/// Id the next insert receives given the ids currently stored
pub fn next_id(ids: impl IntoIterator<Item = i64>) -> i64 {
    ids.into_iter().max().unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id(Vec::new()), 1);
    }

    #[test]
    fn next_id_follows_the_maximum() {
        assert_eq!(next_id(vec![3, 9, 4]), 10);
    }
}
