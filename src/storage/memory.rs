use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{next_id, Record, Repository};
use crate::error::{Result, StoreError};

/// In-process repository backed by a vector behind a read/write lock.
///
/// Constructed explicitly and handed to the stores that use it; there is no
/// shared module-level state.
pub struct MemoryRepository<R> {
    records: RwLock<Vec<R>>,
}

impl<R: Record> MemoryRepository<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start from existing records, kept as given (ids included)
    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<R>>> {
        self.records.read().map_err(|_| poisoned::<R>())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<R>>> {
        self.records.write().map_err(|_| poisoned::<R>())
    }
}

impl<R: Record> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<R: Record>() -> StoreError {
    StoreError::CollaboratorUnavailable(format!("in-memory {} store lock poisoned", R::ENTITY))
}

impl<R: Record> Repository<R> for MemoryRepository<R> {
    fn list(&self) -> Result<Vec<R>> {
        Ok(self.read()?.clone())
    }

    fn get(&self, id: i64) -> Result<Option<R>> {
        Ok(self.read()?.iter().find(|r| r.id() == id).cloned())
    }

    fn insert(&self, record: R) -> Result<R> {
        let mut records = self.write()?;
        let id = next_id(records.iter().map(Record::id));
        let record = record.with_id(id);
        records.push(record.clone());
        Ok(record)
    }

    fn replace(&self, record: &R) -> Result<bool> {
        let mut records = self.write()?;
        match records.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, id: i64) -> Result<Option<R>> {
        let mut records = self.write()?;
        Ok(records
            .iter()
            .position(|r| r.id() == id)
            .map(|index| records.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn category(name: &str) -> Category {
        Category {
            id: 0,
            name: name.to_string(),
            color: "#000000".to_string(),
            task_count: 0,
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let repo = MemoryRepository::new();
        let a = repo.insert(category("a")).unwrap();
        let b = repo.insert(category("b")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
    }

    #[test]
    fn insert_after_removing_max_reuses_max_plus_one() {
        let repo = MemoryRepository::new();
        repo.insert(category("a")).unwrap();
        repo.insert(category("b")).unwrap();
        repo.remove(2).unwrap();
        assert_eq!(repo.insert(category("c")).unwrap().id, 2);
    }

    #[test]
    fn replace_and_remove_report_missing_ids() {
        let repo: MemoryRepository<Category> = MemoryRepository::new();
        assert!(!repo.replace(&category("x").with_id(7)).unwrap());
        assert!(repo.remove(7).unwrap().is_none());
    }

    #[test]
    fn list_keeps_insertion_order() {
        let repo = MemoryRepository::with_records(vec![category("b").with_id(5)]);
        repo.insert(category("a")).unwrap();
        let names: Vec<_> = repo.list().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
