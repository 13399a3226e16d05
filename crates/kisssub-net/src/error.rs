//! Network error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] kisssub_storage::StorageError),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    /// Short machine-readable classification used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NetError::Transport(e) if e.is_timeout() => "timeout",
            NetError::Transport(e) if e.is_connect() => "connect",
            NetError::Transport(e) if e.is_decode() || e.is_body() => "body",
            NetError::Transport(_) => "request",
            NetError::Status(_) => "status",
            NetError::Client(_) => "client",
            NetError::InvalidUrl(_) => "invalid_url",
            NetError::Storage(_) | NetError::Sqlite(_) | NetError::Io(_) => "storage",
        }
    }

    /// Only transport failures are retried; a server answer is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NetError::Transport(e) if !e.is_builder() && !e.is_redirect())
    }
}
