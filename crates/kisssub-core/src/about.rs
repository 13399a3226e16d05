//! About screen controller
//!
//! Shows the build version, runs the manual update check, and hosts the
//! hidden god-mode unlock: five quick taps on the version row reveal the
//! code input.

use std::time::{Duration, Instant};
use url::Url;

use kisssub_net::{is_god_mode, Fetcher, PersistentCookieStore};
use kisssub_presenter::{
    Dispatch, GodModeOutcome, GodModePresenter, GodModeView, InfoBean, InfoOutcome,
    InfoPresenter, InfoView,
};

use crate::version::AppVersion;
use crate::Result;

const SECRET_TAPS: usize = 5;
const SECRET_WINDOW: Duration = Duration::from_millis(2_400);

/// Detects five taps within the reveal window.
#[derive(Debug, Clone, Default)]
pub struct SecretTap {
    hits: [Option<Instant>; SECRET_TAPS],
}

impl SecretTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tap at `now`; true once the last five taps fit the window
    pub fn tap(&mut self, now: Instant) -> bool {
        self.hits.rotate_left(1);
        self.hits[SECRET_TAPS - 1] = Some(now);

        match self.hits[0] {
            Some(first) => now.saturating_duration_since(first) <= SECRET_WINDOW,
            None => false,
        }
    }
}

/// Whether a published update is newer than this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Available,
    UpToDate,
}

impl UpdateStatus {
    pub fn compare(info: &InfoBean, current: &AppVersion) -> Self {
        if info.version_code > i64::from(current.code) {
            UpdateStatus::Available
        } else {
            UpdateStatus::UpToDate
        }
    }
}

pub struct AboutController<F: Fetcher> {
    update: InfoPresenter<F>,
    unlock: GodModePresenter<F>,
    cookies: PersistentCookieStore,
    update_url: String,
    god_mode_url: String,
    version: Option<AppVersion>,
    secret_tap: SecretTap,
    code_input_visible: bool,
    activated: bool,
}

impl<F: Fetcher> AboutController<F> {
    pub fn new(
        update: InfoPresenter<F>,
        unlock: GodModePresenter<F>,
        cookies: PersistentCookieStore,
        update_url: String,
        god_mode_url: String,
        version: Result<AppVersion>,
    ) -> Self {
        let version = match version {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "Could not determine app version");
                None
            }
        };

        let mut controller = Self {
            update,
            unlock,
            cookies,
            update_url,
            god_mode_url,
            version,
            secret_tap: SecretTap::new(),
            code_input_visible: false,
            activated: false,
        };
        controller.activated = controller.check_god_mode();
        controller
    }

    fn check_god_mode(&self) -> bool {
        match Url::parse(&self.god_mode_url) {
            Ok(url) => is_god_mode(&self.cookies, &url),
            Err(e) => {
                tracing::warn!(url = %self.god_mode_url, error = %e, "Invalid god mode URL");
                false
            }
        }
    }

    pub fn is_god_mode(&self) -> bool {
        self.activated
    }

    /// App name as shown in the header
    pub fn title(&self, app_name: &str) -> String {
        if self.activated {
            format!("{app_name} - GOD")
        } else {
            app_name.to_string()
        }
    }

    /// `"1.2.3  『 10203 』"`, or nothing when the version is unknown
    pub fn version_label(&self) -> Option<String> {
        self.version.as_ref().map(AppVersion::label)
    }

    pub fn update_status(&self, info: &InfoBean) -> Option<UpdateStatus> {
        self.version
            .as_ref()
            .map(|current| UpdateStatus::compare(info, current))
    }

    /// Register a tap on the version row; returns whether the code input is visible
    pub fn tap_version(&mut self, now: Instant) -> bool {
        if self.secret_tap.tap(now) && !self.code_input_visible {
            tracing::debug!("Revealed god mode input");
            self.code_input_visible = true;
        }
        self.code_input_visible
    }

    pub fn code_input_visible(&self) -> bool {
        self.code_input_visible
    }

    pub fn check_update(&mut self, view: &mut dyn InfoView) -> Dispatch {
        let url = self.update_url.clone();
        self.update.get(view, &url)
    }

    pub fn submit_code(&mut self, view: &mut dyn GodModeView, code: &str) -> Dispatch {
        let url = self.god_mode_url.clone();
        self.unlock.get(view, &url, code)
    }

    pub fn is_loading(&self) -> bool {
        self.update.is_loading() || self.unlock.is_loading()
    }

    /// Apply whatever finished since the last call
    pub fn deliver(
        &mut self,
        info_view: &mut dyn InfoView,
        god_mode_view: &mut dyn GodModeView,
    ) -> (Option<InfoOutcome>, Option<GodModeOutcome>) {
        let info = self.update.deliver(info_view);
        let god_mode = self.unlock.deliver(god_mode_view);
        if let Some(outcome) = &god_mode {
            self.apply_god_mode(outcome);
        }
        (info, god_mode)
    }

    pub async fn settle_update(&mut self, view: &mut dyn InfoView) -> Option<InfoOutcome> {
        self.update.settle(view).await
    }

    pub async fn settle_god_mode(&mut self, view: &mut dyn GodModeView) -> Option<GodModeOutcome> {
        let outcome = self.unlock.settle(view).await;
        if let Some(outcome) = &outcome {
            self.apply_god_mode(outcome);
        }
        outcome
    }

    fn apply_god_mode(&mut self, outcome: &GodModeOutcome) {
        if *outcome == GodModeOutcome::Activated {
            self.activated = true;
            self.code_input_visible = false;
        }
    }

    /// Tear down: nothing in flight may reach a view afterwards
    pub fn close(&mut self) {
        self.update.unsubscribe();
        self.unlock.unsubscribe();
    }
}
