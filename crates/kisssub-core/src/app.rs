//! Application state container
//!
//! Owns the database and the shared HTTP stack. Screens get their
//! presenters and stores from here; nothing else opens connections.

use std::sync::Arc;
use tokio::runtime::Handle;

use kisssub_net::{Dispatcher, HttpClientFactory, PersistentCookieStore, ResponseCache};
use kisssub_presenter::{GodModePresenter, InfoPresenter};
use kisssub_records::RecordStore;
use kisssub_storage::Database;

use crate::about::AboutController;
use crate::config::Config;
use crate::version::AppVersion;
use crate::Result;

pub struct Kisssub {
    config: Config,
    db: Database,
    cookies: PersistentCookieStore,
    /// Single client shared by every presenter
    dispatcher: Arc<Dispatcher>,
    records: RecordStore,
    runtime: Handle,
}

impl Kisssub {
    /// Open the database at `config.database_path` and build the HTTP stack
    pub fn new(config: Config, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let db = Database::open(&config.database_path)?;
        Self::assemble(config, db, runtime)
    }

    /// Same as [`Kisssub::new`] but nothing touches the disk
    pub fn open_in_memory(config: Config, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let db = Database::open_in_memory()?;
        Self::assemble(config, db, runtime)
    }

    fn assemble(config: Config, db: Database, runtime: Handle) -> Result<Self> {
        let version_code = match AppVersion::current() {
            Ok(version) => version.code,
            Err(e) => {
                tracing::warn!(error = %e, "Unknown build version, reporting 0");
                0
            }
        };

        let cookies = PersistentCookieStore::open(db.clone())?;
        let client = HttpClientFactory::build(&config.net_config(version_code), cookies.clone())?;
        let dispatcher = Dispatcher::new(client, ResponseCache::new(db.clone()))
            .with_retry_count(config.retry_count)
            .with_cache_mode(config.cache_mode);
        let records = RecordStore::new(db.clone());

        tracing::info!(
            database = %config.database_path.display(),
            version_code,
            retry_count = config.retry_count,
            "Kisssub initialized"
        );

        Ok(Self {
            config,
            db,
            cookies,
            dispatcher: Arc::new(dispatcher),
            records,
            runtime,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cookies(&self) -> &PersistentCookieStore {
        &self.cookies
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn info_presenter(&self) -> InfoPresenter<Dispatcher> {
        InfoPresenter::new(self.dispatcher(), self.runtime.clone())
    }

    pub fn god_mode_presenter(&self) -> GodModePresenter<Dispatcher> {
        GodModePresenter::new(self.dispatcher(), self.cookies.clone(), self.runtime.clone())
    }

    /// Controller for a freshly opened about screen
    pub fn about(&self) -> AboutController<Dispatcher> {
        AboutController::new(
            self.info_presenter(),
            self.god_mode_presenter(),
            self.cookies.clone(),
            self.config.update_url.clone(),
            self.config.god_mode_url.clone(),
            AppVersion::current(),
        )
    }

    /// Whether the stored cookies for the unlock endpoint carry `god_mode`
    pub fn is_god_mode(&self) -> bool {
        match url::Url::parse(&self.config.god_mode_url) {
            Ok(url) => kisssub_net::is_god_mode(&self.cookies, &url),
            Err(_) => false,
        }
    }
}
