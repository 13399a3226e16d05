//! Record error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] kisssub_storage::StorageError),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
