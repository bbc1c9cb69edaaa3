#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use taskflow::error::{Result, StoreError};
use taskflow::models::{Category, NewCategory, Task, Template};
use taskflow::storage::{MemoryRepository, Record, Repository};
use taskflow::{Database, Stores};

/// Stores over each backend, so behavioural tests run against both
pub fn all_backends() -> Vec<(&'static str, Stores)> {
    let db = Arc::new(Database::open_in_memory().expect("in-memory sqlite"));
    vec![
        ("memory", Stores::in_memory()),
        ("sqlite", Stores::from_backends(db.clone(), db.clone(), db)),
    ]
}

pub fn seed_category(stores: &Stores, name: &str) -> Category {
    stores
        .categories
        .create(NewCategory::new(name, "#6366f1"))
        .expect("create category")
}

/// A backend that is always down
pub struct UnavailableRepository;

fn down<T>() -> Result<T> {
    Err(StoreError::CollaboratorUnavailable(
        "connection refused".to_string(),
    ))
}

impl<R: Record> Repository<R> for UnavailableRepository {
    fn list(&self) -> Result<Vec<R>> {
        down()
    }

    fn get(&self, _id: i64) -> Result<Option<R>> {
        down()
    }

    fn insert(&self, _record: R) -> Result<R> {
        down()
    }

    fn replace(&self, _record: &R) -> Result<bool> {
        down()
    }

    fn remove(&self, _id: i64) -> Result<Option<R>> {
        down()
    }
}

pub fn unavailable_stores() -> Stores {
    Stores::from_backends(
        Arc::new(UnavailableRepository) as Arc<dyn Repository<Task>>,
        Arc::new(UnavailableRepository) as Arc<dyn Repository<Category>>,
        Arc::new(UnavailableRepository) as Arc<dyn Repository<Template>>,
    )
}

const NO_ID: i64 = 0;
const EVERY_ID: i64 = -1;

/// An in-memory backend whose writes can be made to fail on demand
pub struct FlakyRepository<R> {
    inner: MemoryRepository<R>,
    fail_insert: AtomicBool,
    fail_remove: AtomicBool,
    fail_replace: AtomicI64,
}

impl<R: Record> FlakyRepository<R> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryRepository::new(),
            fail_insert: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
            fail_replace: AtomicI64::new(NO_ID),
        })
    }

    pub fn fail_inserts(&self) {
        self.fail_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_removes(&self) {
        self.fail_remove.store(true, Ordering::SeqCst);
    }

    pub fn fail_replaces(&self) {
        self.fail_replace.store(EVERY_ID, Ordering::SeqCst);
    }

    /// Fail replaces of the record with `id` only
    pub fn fail_replace_of(&self, id: i64) {
        self.fail_replace.store(id, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.fail_insert.store(false, Ordering::SeqCst);
        self.fail_remove.store(false, Ordering::SeqCst);
        self.fail_replace.store(NO_ID, Ordering::SeqCst);
    }
}

impl<R: Record> Repository<R> for FlakyRepository<R> {
    fn list(&self) -> Result<Vec<R>> {
        self.inner.list()
    }

    fn get(&self, id: i64) -> Result<Option<R>> {
        self.inner.get(id)
    }

    fn insert(&self, record: R) -> Result<R> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return down();
        }
        self.inner.insert(record)
    }

    fn replace(&self, record: &R) -> Result<bool> {
        let failing = self.fail_replace.load(Ordering::SeqCst);
        if failing == EVERY_ID || failing == record.id() {
            return down();
        }
        self.inner.replace(record)
    }

    fn remove(&self, id: i64) -> Result<Option<R>> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return down();
        }
        self.inner.remove(id)
    }
}

/// Stores over flaky task and category backends, returned alongside them
pub fn flaky_stores() -> (
    Stores,
    Arc<FlakyRepository<Task>>,
    Arc<FlakyRepository<Category>>,
) {
    let tasks = FlakyRepository::<Task>::new();
    let categories = FlakyRepository::<Category>::new();
    let stores = Stores::from_backends(
        tasks.clone(),
        categories.clone(),
        Arc::new(MemoryRepository::<Template>::new()),
    );
    (stores, tasks, categories)
}
