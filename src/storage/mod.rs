//! Storage module for persisting jobs, pages and run history
//!
//! The engine never owns its storage; it is handed a [`Storage`]
//! implementation. Two are provided:
//! - `SqliteStorage`: file-backed, used by the binary
//! - `MemoryStorage`: process-local, used for embedding and tests

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{Snapshot, Storage, StorageError, StorageResult};

use crate::crawler::ChangeKind;
use crate::job::ExtractedPage;
use std::path::Path;

/// Opens or creates a SQLite storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// A page as saved by one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub run_number: u32,
    pub change: ChangeKind,
    pub page: ExtractedPage,
}
