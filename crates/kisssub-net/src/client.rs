//! HTTP client construction

use reqwest::{Certificate, Client};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cookies::PersistentCookieStore;
use crate::error::NetError;
use crate::Result;

/// Connect and read timeout shared by every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Which server certificates the client accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Bundled webpki roots
    #[default]
    System,
    /// Bundled roots plus the PEM certificates in these files
    WithRoots { pem_files: Vec<PathBuf> },
    /// Accept any certificate. Only for mirrors with broken chains.
    AcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub tls: TlsPolicy,
}

impl NetConfig {
    pub fn new(version_code: u32) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(version_code),
            tls: TlsPolicy::default(),
        }
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Desktop browser UA with the client version appended; the site serves
/// stripped pages to unknown agents.
pub fn default_user_agent(version_code: u32) -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/65.0.3325.32 Safari/537.36 Kisssub/{version_code}"
    )
}

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Build a client that persists cookies into `cookies`
    pub fn build(config: &NetConfig, cookies: PersistentCookieStore) -> Result<Client> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .cookie_provider(Arc::new(cookies));

        match &config.tls {
            TlsPolicy::System => {}
            TlsPolicy::WithRoots { pem_files } => {
                for path in pem_files {
                    let pem = std::fs::read(path)?;
                    let cert = Certificate::from_pem(&pem).map_err(|e| {
                        NetError::Client(format!("bad certificate {}: {e}", path.display()))
                    })?;
                    builder = builder.add_root_certificate(cert);
                }
            }
            TlsPolicy::AcceptInvalid => {
                tracing::warn!("TLS certificate verification disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder
            .build()
            .map_err(|e| NetError::Client(e.to_string()))?;

        tracing::debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            tls = ?config.tls,
            "Built HTTP client"
        );

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kisssub_storage::Database;

    fn cookies() -> PersistentCookieStore {
        PersistentCookieStore::open(Database::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_user_agent_carries_version() {
        let ua = default_user_agent(42);
        assert!(ua.starts_with("Mozilla/5.0"));
        assert!(ua.ends_with("Kisssub/42"));
        assert_eq!(NetConfig::new(42).user_agent, ua);
        assert_eq!(NetConfig::default().timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_build_policies() {
        let mut config = NetConfig::new(1);
        assert!(HttpClientFactory::build(&config, cookies()).is_ok());

        config.tls = TlsPolicy::AcceptInvalid;
        assert!(HttpClientFactory::build(&config, cookies()).is_ok());
    }

    #[test]
    fn test_missing_pem_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = NetConfig {
            tls: TlsPolicy::WithRoots {
                pem_files: vec![dir.path().join("missing.pem")],
            },
            ..NetConfig::new(1)
        };

        let err = HttpClientFactory::build(&config, cookies()).unwrap_err();
        assert!(matches!(err, NetError::Io(_)));
    }

    #[test]
    fn test_tls_policy_serde() {
        let json = serde_json::to_string(&TlsPolicy::AcceptInvalid).unwrap();
        assert_eq!(json, r#"{"mode":"accept_invalid"}"#);

        let parsed: TlsPolicy =
            serde_json::from_str(r#"{"mode":"with_roots","pem_files":["/etc/ca.pem"]}"#).unwrap();
        assert_eq!(
            parsed,
            TlsPolicy::WithRoots {
                pem_files: vec![PathBuf::from("/etc/ca.pem")]
            }
        );
    }
}
