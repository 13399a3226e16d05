//! God-mode unlock presenter
//!
//! The unlock endpoint answers with an arbitrary page; whether the code was
//! accepted is decided by the `god_mode` cookie the server sets, read back
//! from the cookie store once the response is in.

use std::sync::Arc;
use tokio::runtime::Handle;
use url::Url;

use kisssub_net::{is_god_mode, CacheUse, Fetcher, NetError, PersistentCookieStore};

use crate::slot::{Dispatch, RequestSlot, RequestToken, TaskLost};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GodModeOutcome {
    Activated,
    NotActivated,
    Error(String),
}

/// Callbacks the unlock flow drives.
pub trait GodModeView {
    fn loading_changed(&mut self, loading: bool);
    /// An unlock request is already running ("please wait")
    fn busy(&mut self);
    /// The submitted code was blank; nothing was sent
    fn blank_code(&mut self);
    fn activated(&mut self, activated: bool);
    fn other(&mut self, message: String);
}

pub struct GodModePresenter<F: Fetcher> {
    fetcher: Arc<F>,
    cookies: PersistentCookieStore,
    slot: RequestSlot<Result<String, NetError>>,
    /// URL whose cookies decide the outcome of the in-flight request
    check_url: Option<Url>,
}

impl<F: Fetcher> GodModePresenter<F> {
    pub fn new(fetcher: Arc<F>, cookies: PersistentCookieStore, runtime: Handle) -> Self {
        Self {
            fetcher,
            cookies,
            slot: RequestSlot::new(runtime),
            check_url: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_loading()
    }

    /// Submit an unlock code
    pub fn get(&mut self, view: &mut dyn GodModeView, url: &str, code: &str) -> Dispatch {
        let code = code.trim();
        if code.is_empty() {
            view.blank_code();
            return Dispatch::Rejected;
        }

        if self.slot.is_loading() {
            view.busy();
            return Dispatch::Busy;
        }

        let check_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                view.other(format!("Invalid URL: {e}"));
                return Dispatch::Rejected;
            }
        };

        let fetcher = Arc::clone(&self.fetcher);
        let target = url.to_string();
        let query = vec![("code".to_string(), code.to_string())];
        let token = self.slot.start(async move {
            fetcher.fetch(&target, &query, CacheUse::Bypass).await
        });

        match token {
            Some(token) => {
                tracing::debug!(token = %token, url = %check_url, "Submitting god mode code");
                self.check_url = Some(check_url);
                view.loading_changed(true);
                Dispatch::Started(token)
            }
            None => {
                view.busy();
                Dispatch::Busy
            }
        }
    }

    pub fn deliver(&mut self, view: &mut dyn GodModeView) -> Option<GodModeOutcome> {
        let (token, result) = self.slot.try_take()?;
        Some(self.finish(view, token, result))
    }

    pub async fn settle(&mut self, view: &mut dyn GodModeView) -> Option<GodModeOutcome> {
        let (token, result) = self.slot.wait().await?;
        Some(self.finish(view, token, result))
    }

    pub fn unsubscribe(&mut self) {
        self.check_url = None;
        if let Some(token) = self.slot.cancel() {
            tracing::debug!(token = %token, "Cancelled god mode request");
        }
    }

    fn finish(
        &mut self,
        view: &mut dyn GodModeView,
        token: RequestToken,
        result: Result<Result<String, NetError>, TaskLost>,
    ) -> GodModeOutcome {
        let check_url = self.check_url.take();

        let outcome = match (result, check_url) {
            (Ok(Ok(_)), Some(url)) => {
                if is_god_mode(&self.cookies, &url) {
                    GodModeOutcome::Activated
                } else {
                    GodModeOutcome::NotActivated
                }
            }
            (Ok(Ok(_)), None) => GodModeOutcome::NotActivated,
            (Ok(Err(e)), _) => GodModeOutcome::Error(e.to_string()),
            (Err(TaskLost), _) => GodModeOutcome::Error("god mode request aborted".to_string()),
        };

        tracing::info!(token = %token, outcome = ?outcome, "God mode request finished");

        view.loading_changed(false);
        match &outcome {
            GodModeOutcome::Activated => view.activated(true),
            GodModeOutcome::NotActivated => view.activated(false),
            GodModeOutcome::Error(message) => view.other(message.clone()),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Canned, FakeFetcher};
    use kisssub_storage::Database;

    const GOD_MODE_URL: &str = "https://kisssub.org/addon.php";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Loading(bool),
        Busy,
        Blank,
        Activated(bool),
        Other,
    }

    #[derive(Default)]
    struct RecordingView {
        events: Vec<Event>,
        progress_visible: bool,
    }

    impl GodModeView for RecordingView {
        fn loading_changed(&mut self, loading: bool) {
            self.progress_visible = loading;
            self.events.push(Event::Loading(loading));
        }
        fn busy(&mut self) {
            self.events.push(Event::Busy);
        }
        fn blank_code(&mut self) {
            self.events.push(Event::Blank);
        }
        fn activated(&mut self, activated: bool) {
            self.events.push(Event::Activated(activated));
        }
        fn other(&mut self, _message: String) {
            self.events.push(Event::Other);
        }
    }

    fn cookies() -> PersistentCookieStore {
        PersistentCookieStore::open(Database::open_in_memory().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_cookie_decides_activation() {
        let store = cookies();
        let fetcher = FakeFetcher::with_cookies(
            vec![Canned::BodyWithCookie("ok", "god_mode=1; Max-Age=86400; Path=/")],
            store.clone(),
        );
        let mut presenter = GodModePresenter::new(Arc::clone(&fetcher), store, Handle::current());
        let mut view = RecordingView::default();

        assert!(presenter.get(&mut view, GOD_MODE_URL, "  sesame ").is_started());
        let outcome = presenter.settle(&mut view).await.unwrap();

        assert_eq!(outcome, GodModeOutcome::Activated);
        assert_eq!(
            view.events,
            vec![Event::Loading(true), Event::Loading(false), Event::Activated(true)]
        );

        let call = &fetcher.calls()[0];
        assert_eq!(call.query, vec![("code".to_string(), "sesame".to_string())]);
        assert_eq!(call.cache, CacheUse::Bypass);
    }

    #[tokio::test]
    async fn test_success_without_cookie_is_not_activated() {
        let store = cookies();
        let fetcher = FakeFetcher::with_cookies(
            vec![Canned::BodyWithCookie("ok", "god_moderate=1; Path=/")],
            store.clone(),
        );
        let mut presenter = GodModePresenter::new(fetcher, store, Handle::current());
        let mut view = RecordingView::default();

        presenter.get(&mut view, GOD_MODE_URL, "wrong");
        let outcome = presenter.settle(&mut view).await.unwrap();

        assert_eq!(outcome, GodModeOutcome::NotActivated);
        assert_eq!(view.events.last(), Some(&Event::Activated(false)));
        assert!(!view.progress_visible);
    }

    #[tokio::test]
    async fn test_blank_code_sends_nothing() {
        let fetcher = FakeFetcher::new(vec![]);
        let mut presenter = GodModePresenter::new(Arc::clone(&fetcher), cookies(), Handle::current());
        let mut view = RecordingView::default();

        assert_eq!(presenter.get(&mut view, GOD_MODE_URL, "   "), Dispatch::Rejected);
        assert_eq!(view.events, vec![Event::Blank]);
        assert!(fetcher.calls().is_empty());
        assert!(!presenter.is_loading());
    }

    #[tokio::test]
    async fn test_busy_and_error() {
        let fetcher = FakeFetcher::new(vec![Canned::Status(502)]);
        let mut presenter = GodModePresenter::new(Arc::clone(&fetcher), cookies(), Handle::current());
        let mut view = RecordingView::default();

        presenter.get(&mut view, GOD_MODE_URL, "a");
        assert_eq!(presenter.get(&mut view, GOD_MODE_URL, "b"), Dispatch::Busy);

        let outcome = presenter.settle(&mut view).await.unwrap();
        assert!(matches!(outcome, GodModeOutcome::Error(_)));
        assert_eq!(
            view.events,
            vec![Event::Loading(true), Event::Busy, Event::Loading(false), Event::Other]
        );
        assert_eq!(fetcher.calls().len(), 1);
        assert!(!presenter.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let fetcher = FakeFetcher::new(vec![]);
        let mut presenter = GodModePresenter::new(Arc::clone(&fetcher), cookies(), Handle::current());
        let mut view = RecordingView::default();

        assert_eq!(presenter.get(&mut view, "::nope", "code"), Dispatch::Rejected);
        assert_eq!(view.events, vec![Event::Other]);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_late_response() {
        let store = cookies();
        let fetcher = FakeFetcher::with_cookies(
            vec![Canned::BodyWithCookie("ok", "god_mode=1; Max-Age=60; Path=/")],
            store.clone(),
        );
        let mut presenter = GodModePresenter::new(fetcher, store, Handle::current());
        let mut view = RecordingView::default();

        presenter.get(&mut view, GOD_MODE_URL, "code");
        presenter.unsubscribe();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(presenter.deliver(&mut view).is_none());
        assert_eq!(view.events, vec![Event::Loading(true)]);
    }
}
