//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use kisssub_net::{default_user_agent, CacheMode, NetConfig, TlsPolicy, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT};

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Version info endpoint
    pub update_url: String,
    /// God mode unlock endpoint, takes a `code` query parameter
    pub god_mode_url: String,
    /// Connect and read timeout
    pub timeout_ms: u64,
    /// Extra attempts after a transport failure
    pub retry_count: u32,
    pub cache_mode: CacheMode,
    pub tls: TlsPolicy,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("kisssub.db"),
            update_url: "https://www.kisssub.org/app/update.json".to_string(),
            god_mode_url: "https://www.kisssub.org/app/god_mode.php".to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retry_count: DEFAULT_RETRY_COUNT,
            cache_mode: CacheMode::default(),
            tls: TlsPolicy::default(),
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Kisssub"))
            .unwrap_or_else(|| PathBuf::from(".kisssub"))
    }

    /// Read a JSON config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("update_url", &self.update_url), ("god_mode_url", &self.god_mode_url)] {
            url::Url::parse(value)
                .map_err(|e| CoreError::Config(format!("{name}: {e}")))?;
        }
        if self.timeout_ms == 0 {
            return Err(CoreError::Config("timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Client settings for the given build number
    pub fn net_config(&self, version_code: u32) -> NetConfig {
        NetConfig {
            timeout: self.timeout(),
            user_agent: default_user_agent(version_code),
            tls: self.tls.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(
            target_os = "windows",
            target_os = "macos",
            target_os = "linux",
            target_os = "android"
        )))]
        {
            None
        }
    }
}
