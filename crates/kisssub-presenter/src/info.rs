//! Update-check presenter

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;

use kisssub_net::{CacheUse, Fetcher, NetError};

use crate::slot::{Dispatch, RequestSlot, RequestToken, TaskLost};

/// Version metadata published at the update endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfoBean {
    pub version_code: i64,
    pub version_name: String,
    /// Changelog shown in the update dialog
    pub description: String,
    /// Download page
    pub url: String,
    pub date: String,
}

impl InfoBean {
    pub fn is_empty(&self) -> bool {
        self.version_code == 0 && self.version_name.trim().is_empty()
    }
}

/// Terminal outcome of one update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoOutcome {
    Success(InfoBean),
    Empty,
    Error(String),
}

impl InfoOutcome {
    /// Classify a response body
    pub fn from_response(response: Result<String, NetError>) -> Self {
        let body = match response {
            Ok(body) => body,
            Err(e) => return InfoOutcome::Error(e.to_string()),
        };

        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return InfoOutcome::Empty;
        }

        match serde_json::from_str::<InfoBean>(trimmed) {
            Ok(bean) if bean.is_empty() => InfoOutcome::Empty,
            Ok(bean) => InfoOutcome::Success(bean),
            Err(e) => InfoOutcome::Error(format!("malformed version info: {e}")),
        }
    }
}

/// Callbacks the update check drives.
pub trait InfoView {
    /// Show or hide the progress indicator
    fn loading_changed(&mut self, loading: bool);
    /// A check is already running ("please wait")
    fn busy(&mut self);
    fn success(&mut self, info: InfoBean);
    /// The endpoint answered without version info
    fn no_data(&mut self);
    fn error(&mut self, message: String);
}

pub struct InfoPresenter<F: Fetcher> {
    fetcher: Arc<F>,
    slot: RequestSlot<Result<String, NetError>>,
}

impl<F: Fetcher> InfoPresenter<F> {
    pub fn new(fetcher: Arc<F>, runtime: Handle) -> Self {
        Self {
            fetcher,
            slot: RequestSlot::new(runtime),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.slot.is_loading()
    }

    /// Start an update check unless one is already running
    pub fn get(&mut self, view: &mut dyn InfoView, url: &str) -> Dispatch {
        if self.slot.is_loading() {
            view.busy();
            return Dispatch::Busy;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let url = url.to_string();
        let target = url.clone();
        let token = self.slot.start(async move {
            fetcher.fetch(&target, &[], CacheUse::Default).await
        });

        match token {
            Some(token) => {
                tracing::debug!(token = %token, url = %url, "Checking for updates");
                view.loading_changed(true);
                Dispatch::Started(token)
            }
            None => {
                view.busy();
                Dispatch::Busy
            }
        }
    }

    /// Apply a finished check to `view`, if one has finished
    pub fn deliver(&mut self, view: &mut dyn InfoView) -> Option<InfoOutcome> {
        let (token, result) = self.slot.try_take()?;
        Some(finish(view, token, result))
    }

    /// Wait for the running check and apply it to `view`
    pub async fn settle(&mut self, view: &mut dyn InfoView) -> Option<InfoOutcome> {
        let (token, result) = self.slot.wait().await?;
        Some(finish(view, token, result))
    }

    /// Drop the running check; its response will never reach a view
    pub fn unsubscribe(&mut self) {
        if let Some(token) = self.slot.cancel() {
            tracing::debug!(token = %token, "Cancelled update check");
        }
    }
}

fn finish(
    view: &mut dyn InfoView,
    token: RequestToken,
    result: Result<Result<String, NetError>, TaskLost>,
) -> InfoOutcome {
    let outcome = match result {
        Ok(response) => InfoOutcome::from_response(response),
        Err(TaskLost) => InfoOutcome::Error("update check aborted".to_string()),
    };

    tracing::debug!(token = %token, outcome = ?outcome, "Update check finished");

    view.loading_changed(false);
    match &outcome {
        InfoOutcome::Success(bean) => view.success(bean.clone()),
        InfoOutcome::Empty => view.no_data(),
        InfoOutcome::Error(message) => view.error(message.clone()),
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Canned, FakeFetcher};

    const UPDATE_URL: &str = "https://kisssub.org/update.json";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Loading(bool),
        Busy,
        Success(InfoBean),
        NoData,
        Error,
    }

    #[derive(Default)]
    struct RecordingView {
        events: Vec<Event>,
        progress_visible: bool,
    }

    impl InfoView for RecordingView {
        fn loading_changed(&mut self, loading: bool) {
            self.progress_visible = loading;
            self.events.push(Event::Loading(loading));
        }
        fn busy(&mut self) {
            self.events.push(Event::Busy);
        }
        fn success(&mut self, info: InfoBean) {
            self.events.push(Event::Success(info));
        }
        fn no_data(&mut self) {
            self.events.push(Event::NoData);
        }
        fn error(&mut self, _message: String) {
            self.events.push(Event::Error);
        }
    }

    fn presenter(responses: Vec<Canned>) -> (InfoPresenter<FakeFetcher>, Arc<FakeFetcher>) {
        let fetcher = FakeFetcher::new(responses);
        (
            InfoPresenter::new(Arc::clone(&fetcher), Handle::current()),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_success_hands_bean_unchanged() {
        let (mut presenter, _) = presenter(vec![Canned::Body(
            r#"{"versionCode":12,"versionName":"1.2.0","description":"fixes","url":"https://kisssub.org/apk","date":"2018-03-01"}"#,
        )]);
        let mut view = RecordingView::default();

        assert!(presenter.get(&mut view, UPDATE_URL).is_started());
        assert!(presenter.is_loading());
        assert!(view.progress_visible);

        let expected = InfoBean {
            version_code: 12,
            version_name: "1.2.0".to_string(),
            description: "fixes".to_string(),
            url: "https://kisssub.org/apk".to_string(),
            date: "2018-03-01".to_string(),
        };
        let outcome = presenter.settle(&mut view).await.unwrap();
        assert_eq!(outcome, InfoOutcome::Success(expected.clone()));
        assert_eq!(
            view.events,
            vec![Event::Loading(true), Event::Loading(false), Event::Success(expected)]
        );
        assert!(!presenter.is_loading());
        assert!(!view.progress_visible);
    }

    #[tokio::test]
    async fn test_second_get_while_loading_is_busy() {
        let (mut presenter, fetcher) = presenter(vec![Canned::Body(r#"{"versionCode":1}"#)]);
        let mut view = RecordingView::default();

        presenter.get(&mut view, UPDATE_URL);
        assert_eq!(presenter.get(&mut view, UPDATE_URL), Dispatch::Busy);
        assert_eq!(view.events, vec![Event::Loading(true), Event::Busy]);

        presenter.settle(&mut view).await.unwrap();
        assert_eq!(fetcher.calls().len(), 1);
        assert_eq!(fetcher.calls()[0].url, UPDATE_URL);
        assert_eq!(fetcher.calls()[0].cache, CacheUse::Default);
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_not_error() {
        for body in ["", "   \n", "null", "{}"] {
            let (mut presenter, _) = presenter(vec![Canned::Body(body)]);
            let mut view = RecordingView::default();

            presenter.get(&mut view, UPDATE_URL);
            let outcome = presenter.settle(&mut view).await.unwrap();

            assert_eq!(outcome, InfoOutcome::Empty, "body {body:?}");
            assert_eq!(view.events.last(), Some(&Event::NoData));
            assert!(!view.progress_visible);
        }
    }

    #[tokio::test]
    async fn test_failures_are_errors() {
        for canned in [Canned::Status(503), Canned::Body("<html>oops</html>")] {
            let (mut presenter, _) = presenter(vec![canned]);
            let mut view = RecordingView::default();

            presenter.get(&mut view, UPDATE_URL);
            let outcome = presenter.settle(&mut view).await.unwrap();

            assert!(matches!(outcome, InfoOutcome::Error(_)));
            assert_eq!(view.events, vec![Event::Loading(true), Event::Loading(false), Event::Error]);
            assert!(!presenter.is_loading());
        }
    }

    #[tokio::test]
    async fn test_deliver_polls_without_blocking() {
        let (mut presenter, _) = presenter(vec![Canned::Body(r#"{"versionName":"2.0"}"#)]);
        let mut view = RecordingView::default();

        presenter.get(&mut view, UPDATE_URL);
        assert!(presenter.deliver(&mut view).is_none());

        let mut outcome = None;
        for _ in 0..100 {
            tokio::task::yield_now().await;
            outcome = presenter.deliver(&mut view);
            if outcome.is_some() {
                break;
            }
        }

        assert!(matches!(outcome, Some(InfoOutcome::Success(ref bean)) if bean.version_name == "2.0"));
        assert!(presenter.deliver(&mut view).is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_late_response() {
        let (mut presenter, _) = presenter(vec![Canned::Body(r#"{"versionCode":5}"#)]);
        let mut view = RecordingView::default();

        presenter.get(&mut view, UPDATE_URL);
        presenter.unsubscribe();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(presenter.deliver(&mut view).is_none());
        assert!(presenter.settle(&mut view).await.is_none());
        assert_eq!(view.events, vec![Event::Loading(true)]);
        assert!(!presenter.is_loading());
    }

    #[tokio::test]
    async fn test_can_check_again_after_terminal_state() {
        let (mut presenter, fetcher) = presenter(vec![
            Canned::Status(500),
            Canned::Body(r#"{"versionCode":2}"#),
        ]);
        let mut view = RecordingView::default();

        presenter.get(&mut view, UPDATE_URL);
        presenter.settle(&mut view).await;
        assert!(presenter.get(&mut view, UPDATE_URL).is_started());
        let outcome = presenter.settle(&mut view).await.unwrap();

        assert!(matches!(outcome, InfoOutcome::Success(_)));
        assert_eq!(fetcher.calls().len(), 2);
    }
}
