//! Kisssub Networking
//!
//! Builds the shared HTTP client and the dispatcher every request goes
//! through:
//! - connect/read timeouts from one default
//! - cookies persisted in SQLite across restarts
//! - configurable TLS trust
//! - retry count, cache fallback and common headers on the dispatcher

mod cache;
mod client;
mod cookies;
mod dispatch;
mod error;
mod god_mode;

pub use cache::{CachedResponse, ResponseCache};
pub use client::{
    default_user_agent, HttpClientFactory, NetConfig, TlsPolicy, DEFAULT_TIMEOUT,
};
pub use cookies::{Cookie, PersistentCookieStore};
pub use dispatch::{CacheMode, CacheUse, Dispatcher, Fetcher, DEFAULT_RETRY_COUNT};
pub use error::NetError;
pub use god_mode::{contains_god_mode, is_god_mode};

pub type Result<T> = std::result::Result<T, NetError>;
