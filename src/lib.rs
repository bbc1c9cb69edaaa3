pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod models;
pub mod stats;
pub mod storage;
pub mod stores;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use error::{Result, StoreError};
pub use filter::TaskFilter;
pub use models::{Category, NewCategory, NewTask, NewTemplate, Priority, Task, Template};
pub use stats::{DashboardStats, Progress};
pub use stores::Stores;
pub use utils::Profile;
