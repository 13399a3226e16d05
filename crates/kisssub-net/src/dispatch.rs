//! Request dispatcher
//!
//! Wraps the shared client with the policy every request follows: retry
//! count, cache mode and common headers. The client itself never retries.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use url::Url;

use crate::cache::ResponseCache;
use crate::error::NetError;
use crate::Result;

pub const DEFAULT_RETRY_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Never store or read cached bodies
    NoCache,
    /// Store successful bodies; serve them when a later request fails
    #[default]
    RequestFailedReadCache,
}

/// Per-request cache override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUse {
    /// Follow the dispatcher's cache mode
    Default,
    /// Skip the cache entirely, e.g. for requests with side effects
    Bypass,
}

/// Issues GET requests on behalf of presenters.
pub trait Fetcher: Send + Sync + 'static {
    /// GET `url` with `query` appended, returning the response body
    fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        cache: CacheUse,
    ) -> impl Future<Output = Result<String>> + Send;
}

pub struct Dispatcher {
    client: Client,
    cache: ResponseCache,
    cache_mode: CacheMode,
    retry_count: u32,
    common_headers: HeaderMap,
}

impl Dispatcher {
    pub fn new(client: Client, cache: ResponseCache) -> Self {
        Self {
            client,
            cache,
            cache_mode: CacheMode::default(),
            retry_count: DEFAULT_RETRY_COUNT,
            common_headers: HeaderMap::new(),
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| NetError::Client(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| NetError::Client(format!("invalid header value: {e}")))?;
        self.common_headers.insert(name, value);
        Ok(self)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a text body, retrying transport failures and falling back to
    /// the cached body when the request ultimately fails
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(String, String)],
        cache: CacheUse,
    ) -> Result<String> {
        let mut target = Url::parse(url)?;
        if !query.is_empty() {
            target.query_pairs_mut().extend_pairs(query);
        }
        let key = target.to_string();

        let use_cache =
            cache == CacheUse::Default && self.cache_mode == CacheMode::RequestFailedReadCache;

        match self.get_with_retry(&target).await {
            Ok((status, body)) => {
                if use_cache {
                    if let Err(e) = self.cache.put(&key, status, &body) {
                        tracing::warn!(url = %key, error = %e, "Failed to cache response");
                    }
                }
                Ok(body)
            }
            Err(err) => {
                if use_cache {
                    match self.cache.get(&key) {
                        Ok(Some(cached)) => {
                            tracing::warn!(
                                url = %key,
                                error = %err,
                                stored_at = %cached.stored_at,
                                "Request failed, serving cached response"
                            );
                            return Ok(cached.body);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(url = %key, error = %e, "Failed to read response cache");
                        }
                    }
                }
                Err(err)
            }
        }
    }

    async fn get_with_retry(&self, url: &Url) -> Result<(u16, String)> {
        let mut attempt = 0;
        loop {
            match self.get_once(url).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.retry_count => {
                    attempt += 1;
                    tracing::debug!(
                        url = %url,
                        attempt,
                        kind = e.kind(),
                        "Retrying request"
                    );
                }
                Err(e) => {
                    tracing::debug!(url = %url, kind = e.kind(), error = %e, "Request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn get_once(&self, url: &Url) -> Result<(u16, String)> {
        let response = self
            .client
            .get(url.clone())
            .headers(self.common_headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok((status.as_u16(), body))
    }
}

impl Fetcher for Dispatcher {
    fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        cache: CacheUse,
    ) -> impl Future<Output = Result<String>> + Send {
        self.get_text(url, query, cache)
    }
}
