//! Kisssub Core
//!
//! Wires storage, networking and presenters into one application
//! container. The view layer talks to this crate only.

mod about;
mod app;
mod config;
mod error;
mod version;

pub use about::{AboutController, SecretTap, UpdateStatus};
pub use app::Kisssub;
pub use config::Config;
pub use error::CoreError;
pub use version::AppVersion;

// Re-export core components
pub use kisssub_net::{
    CacheMode, Dispatcher, NetError, PersistentCookieStore, TlsPolicy,
};
pub use kisssub_presenter::{
    Dispatch, GodModeOutcome, GodModePresenter, GodModeView, InfoBean, InfoOutcome,
    InfoPresenter, InfoView, RequestToken,
};
pub use kisssub_records::{
    play_target, HistoryTitle, NewRecord, Record, RecordError, RecordStore, RecordType,
};
pub use kisssub_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
