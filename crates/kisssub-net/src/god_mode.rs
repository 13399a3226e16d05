//! God-mode unlock detection
//!
//! The server grants god mode by setting a `god_mode` cookie. Detection is a
//! pattern match over the serialized cookie list, not a structured read.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::cookies::PersistentCookieStore;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"god_mode\s*=").expect("static pattern"))
}

/// Whether serialized cookie text carries the god-mode flag.
pub fn contains_god_mode(cookie_text: &str) -> bool {
    pattern().is_match(cookie_text)
}

/// Whether the store holds a god-mode cookie for `url`.
pub fn is_god_mode(store: &PersistentCookieStore, url: &Url) -> bool {
    let dump = store.dump(url);
    let active = contains_god_mode(&dump);
    tracing::debug!(url = %url, active, "God mode cookie check");
    active
}
