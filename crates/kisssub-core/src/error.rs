//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] kisssub_storage::StorageError),

    #[error("Record error: {0}")]
    Record(#[from] kisssub_records::RecordError),

    #[error("Network error: {0}")]
    Net(#[from] kisssub_net::NetError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    Version(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
