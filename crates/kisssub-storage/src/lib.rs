//! Kisssub Storage Layer
//!
//! SQLite persistence shared by the record table, the cookie jar and the
//! HTTP response cache.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
