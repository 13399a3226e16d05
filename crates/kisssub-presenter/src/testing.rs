//! Scripted fetcher for presenter tests

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use url::Url;

use kisssub_net::{CacheUse, Fetcher, NetError, PersistentCookieStore};

pub enum Canned {
    Body(&'static str),
    Status(u16),
    /// Body plus a `Set-Cookie` the fake server "sends"
    BodyWithCookie(&'static str, &'static str),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub cache: CacheUse,
}

pub struct FakeFetcher {
    responses: Mutex<VecDeque<Canned>>,
    calls: Mutex<Vec<Call>>,
    cookies: Option<PersistentCookieStore>,
}

impl FakeFetcher {
    pub fn new(responses: Vec<Canned>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            cookies: None,
        })
    }

    pub fn with_cookies(responses: Vec<Canned>, cookies: PersistentCookieStore) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            cookies: Some(cookies),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(
        &self,
        url: &str,
        query: &[(String, String)],
        cache: CacheUse,
    ) -> impl Future<Output = kisssub_net::Result<String>> + Send {
        self.calls.lock().push(Call {
            url: url.to_string(),
            query: query.to_vec(),
            cache,
        });

        let next = self.responses.lock().pop_front();
        let result = match next {
            Some(Canned::Body(body)) => Ok(body.to_string()),
            Some(Canned::Status(code)) => Err(NetError::Status(code)),
            Some(Canned::BodyWithCookie(body, set_cookie)) => {
                if let (Some(store), Ok(site)) = (&self.cookies, Url::parse(url)) {
                    store.save_from_response([set_cookie], &site).ok();
                }
                Ok(body.to_string())
            }
            None => Err(NetError::Status(404)),
        };

        async move {
            tokio::task::yield_now().await;
            result
        }
    }
}
