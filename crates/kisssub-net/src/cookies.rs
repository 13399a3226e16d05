//! Persistent cookie jar
//!
//! Cookies live in an in-memory map mirrored to the `cookies` table, so
//! they survive restarts. The store plugs into reqwest as its cookie
//! provider.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::HeaderValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

use kisssub_storage::Database;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lowercase, without a leading dot
    pub domain: String,
    pub path: String,
    /// `None` for session cookies
    pub expires_at: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
    /// Set when the server sent no Domain attribute
    pub host_only: bool,
}

type CookieKey = (String, String, String);

impl Cookie {
    /// Parse one `Set-Cookie` header received from `url`.
    ///
    /// Returns `None` for malformed headers and for cookies whose Domain
    /// attribute does not cover the request host.
    pub fn parse(header: &str, url: &Url) -> Option<Cookie> {
        let host = url.host_str()?.to_lowercase();
        let mut parts = header.split(';');

        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: host.clone(),
            path: default_path(url),
            expires_at: None,
            secure: false,
            http_only: false,
            host_only: true,
        };

        let mut max_age: Option<i64> = None;

        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim().to_lowercase(), v.trim()),
                None => (attr.trim().to_lowercase(), ""),
            };

            match key.as_str() {
                "expires" => {
                    if let Some(at) = parse_expires(val) {
                        cookie.expires_at = Some(at);
                    }
                }
                "max-age" => {
                    if let Ok(secs) = val.parse::<i64>() {
                        max_age = Some(secs);
                    }
                }
                "domain" => {
                    let domain = val.trim_start_matches('.').to_lowercase();
                    if domain.is_empty() {
                        continue;
                    }
                    if !domain_matches(&host, &domain) {
                        tracing::debug!(host = %host, domain = %domain, "Rejected foreign cookie domain");
                        return None;
                    }
                    if !domain.contains('.') {
                        // A bare label only stands for the exact host it came from
                        if domain != host {
                            tracing::debug!(host = %host, domain = %domain, "Rejected top-level cookie domain");
                            return None;
                        }
                        continue;
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "path" => {
                    if val.starts_with('/') {
                        cookie.path = val.to_string();
                    }
                }
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }

        // Max-Age wins over Expires
        if let Some(secs) = max_age {
            cookie.expires_at = Some(if secs <= 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                Duration::try_seconds(secs)
                    .and_then(|d| Utc::now().checked_add_signed(d))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
        }

        Some(cookie)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    pub fn is_persistent(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Whether this cookie should be sent with a request to `url`.
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };

        domain_ok
            && path_matches(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
    }

    fn key(&self) -> CookieKey {
        (self.domain.clone(), self.path.clone(), self.name.clone())
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(at) = self.expires_at {
            write!(f, "; expires={}", at.format("%a, %d %b %Y %H:%M:%S GMT"))?;
        }
        if !self.host_only {
            write!(f, "; domain={}", self.domain)?;
        }
        write!(f, "; path={}", self.path)?;
        if self.secure {
            write!(f, "; secure")?;
        }
        if self.http_only {
            write!(f, "; httponly")?;
        }
        Ok(())
    }
}

fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    // Netscape style: "Wed, 21-Oct-2015 07:28:00 GMT"
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Cookie jar backed by the `cookies` table.
pub struct PersistentCookieStore {
    cookies: Arc<RwLock<HashMap<CookieKey, Cookie>>>,
    db: Database,
}

impl PersistentCookieStore {
    /// Load persisted cookies, dropping the ones that expired meanwhile
    pub fn open(db: Database) -> Result<Self> {
        let now = Utc::now();

        let loaded: Vec<Cookie> = db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT domain, path, name, value, expires_at, secure, http_only, host_only
                 FROM cookies",
            )?;

            let cookies: Vec<Cookie> = stmt
                .query_map([], |row| {
                    let expires_str: Option<String> = row.get(4)?;
                    let expires_at = expires_str.and_then(|s| {
                        DateTime::parse_from_rfc3339(&s)
                            .map(|dt| dt.with_timezone(&Utc))
                            .ok()
                    });

                    Ok(Cookie {
                        domain: row.get(0)?,
                        path: row.get(1)?,
                        name: row.get(2)?,
                        value: row.get(3)?,
                        expires_at,
                        secure: row.get(5)?,
                        http_only: row.get(6)?,
                        host_only: row.get(7)?,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok::<_, rusqlite::Error>(cookies)
        })?;

        let (expired, live): (Vec<Cookie>, Vec<Cookie>) =
            loaded.into_iter().partition(|c| c.is_expired(now));

        if !expired.is_empty() {
            db.with_connection(|conn| {
                for cookie in &expired {
                    delete_row(conn, cookie)?;
                }
                Ok::<_, rusqlite::Error>(())
            })?;
            tracing::debug!(count = expired.len(), "Purged expired cookies");
        }

        let cookies = live.into_iter().map(|c| (c.key(), c)).collect();

        Ok(Self {
            cookies: Arc::new(RwLock::new(cookies)),
            db,
        })
    }

    /// Store cookies; an already-expired cookie deletes its stored twin
    pub fn save(&self, cookies: Vec<Cookie>) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }

        let now = Utc::now();

        self.db.transaction(|conn| {
            for cookie in &cookies {
                if cookie.is_expired(now) {
                    delete_row(conn, cookie)?;
                } else if cookie.is_persistent() {
                    conn.execute(
                        "INSERT OR REPLACE INTO cookies
                         (domain, path, name, value, expires_at, secure, http_only, host_only, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        rusqlite::params![
                            cookie.domain,
                            cookie.path,
                            cookie.name,
                            cookie.value,
                            cookie.expires_at.map(|at| at.to_rfc3339()),
                            cookie.secure,
                            cookie.http_only,
                            cookie.host_only,
                            now.to_rfc3339(),
                        ],
                    )?;
                } else {
                    // Session cookies stay in memory only
                    delete_row(conn, cookie)?;
                }
            }
            Ok::<_, rusqlite::Error>(())
        })?;

        let mut map = self.cookies.write();
        for cookie in cookies {
            if cookie.is_expired(now) {
                map.remove(&cookie.key());
            } else {
                map.insert(cookie.key(), cookie);
            }
        }

        Ok(())
    }

    /// Parse raw `Set-Cookie` values as if received from `url` and store them
    pub fn save_from_response<'a, I>(&self, headers: I, url: &Url) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let parsed: Vec<Cookie> = headers
            .into_iter()
            .filter_map(|h| Cookie::parse(h, url))
            .collect();
        let count = parsed.len();
        self.save(parsed)?;
        Ok(count)
    }

    /// Live cookies that apply to `url`, longest path first
    pub fn get_cookies(&self, url: &Url) -> Vec<Cookie> {
        let now = Utc::now();
        let mut matched: Vec<Cookie> = self
            .cookies
            .read()
            .values()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then(a.name.cmp(&b.name)));
        matched
    }

    /// Serialized cookie list for `url`, e.g. `[a=1; path=/, b=2; path=/]`
    pub fn dump(&self, url: &Url) -> String {
        let cookies: Vec<String> = self.get_cookies(url).iter().map(|c| c.to_string()).collect();
        format!("[{}]", cookies.join(", "))
    }

    pub fn all(&self) -> Vec<Cookie> {
        self.cookies.read().values().cloned().collect()
    }

    /// Remove every cookie that would be sent to `url`
    pub fn remove_for(&self, url: &Url) -> Result<usize> {
        let targets = self.get_cookies(url);

        self.db.with_connection(|conn| {
            for cookie in &targets {
                delete_row(conn, cookie)?;
            }
            Ok::<_, rusqlite::Error>(())
        })?;

        let mut map = self.cookies.write();
        for cookie in &targets {
            map.remove(&cookie.key());
        }

        Ok(targets.len())
    }

    pub fn clear(&self) -> Result<()> {
        self.db
            .with_connection(|conn| conn.execute("DELETE FROM cookies", []))?;
        self.cookies.write().clear();
        tracing::info!("Cleared cookie store");
        Ok(())
    }
}

impl Clone for PersistentCookieStore {
    fn clone(&self) -> Self {
        Self {
            cookies: Arc::clone(&self.cookies),
            db: self.db.clone(),
        }
    }
}

/// reqwest calls `set_cookies` on the task that received the response, so
/// the SQLite write happens there. It is one small transaction per response
/// and only persistent cookies reach the disk.
impl reqwest::cookie::CookieStore for PersistentCookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let parsed: Vec<Cookie> = cookie_headers
            .filter_map(|h| h.to_str().ok())
            .filter_map(|h| Cookie::parse(h, url))
            .collect();

        if let Err(e) = self.save(parsed) {
            tracing::warn!(url = %url, error = %e, "Failed to persist cookies");
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .get_cookies(url)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

fn delete_row(conn: &rusqlite::Connection, cookie: &Cookie) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM cookies WHERE domain = ?1 AND path = ?2 AND name = ?3",
        rusqlite::params![cookie.domain, cookie.path, cookie.name],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn store() -> PersistentCookieStore {
        PersistentCookieStore::open(Database::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_attributes() {
        let cookie = Cookie::parse(
            "god_mode=1; Expires=Wed, 21 Oct 2037 07:28:00 GMT; Domain=.kisssub.org; Path=/; Secure; HttpOnly",
            &url("https://www.kisssub.org/addon.php"),
        )
        .unwrap();

        assert_eq!(cookie.name, "god_mode");
        assert_eq!(cookie.value, "1");
        assert_eq!(cookie.domain, "kisssub.org");
        assert!(!cookie.host_only);
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.expires_at.unwrap().to_rfc3339(), "2037-10-21T07:28:00+00:00");
    }

    #[test]
    fn test_parse_defaults_and_rejects() {
        let cookie = Cookie::parse("sid=abc", &url("http://kisssub.org/a/b.php")).unwrap();
        assert_eq!(cookie.path, "/a");
        assert!(cookie.host_only);
        assert!(cookie.expires_at.is_none());

        assert!(Cookie::parse("novalue", &url("http://kisssub.org/")).is_none());
        assert!(Cookie::parse("=x", &url("http://kisssub.org/")).is_none());
        assert!(Cookie::parse("a=1; Domain=evil.com", &url("http://kisssub.org/")).is_none());
    }

    #[test]
    fn test_top_level_domain_rejected() {
        let site = url("https://www.kisssub.org/app/god_mode.php");
        assert!(Cookie::parse("god_mode=1; Domain=org", &site).is_none());
        assert!(Cookie::parse("god_mode=1; Domain=.org", &site).is_none());

        let store = store();
        let accepted = store
            .save_from_response(["god_mode=1; Domain=org; Max-Age=60; Path=/"], &site)
            .unwrap();
        assert_eq!(accepted, 0);
        assert_eq!(store.dump(&url("https://attacker.org/")), "[]");
        assert!(!crate::is_god_mode(&store, &url("https://attacker.org/")));

        // A dotless host may still name itself
        let local = Cookie::parse("a=1; Domain=localhost", &url("http://localhost/")).unwrap();
        assert_eq!(local.domain, "localhost");
        assert!(local.host_only);
    }

    #[test]
    fn test_netscape_expires_and_max_age() {
        let cookie = Cookie::parse(
            "a=1; expires=Wed, 21-Oct-2037 07:28:00 GMT",
            &url("http://kisssub.org/"),
        )
        .unwrap();
        assert!(cookie.is_persistent());

        let gone = Cookie::parse(
            "a=1; expires=Wed, 21 Oct 2037 07:28:00 GMT; Max-Age=0",
            &url("http://kisssub.org/"),
        )
        .unwrap();
        assert!(gone.is_expired(Utc::now()));
    }

    #[test]
    fn test_matching_rules() {
        let host_only = Cookie::parse("a=1", &url("http://kisssub.org/")).unwrap();
        assert!(host_only.matches(&url("http://kisssub.org/list.php")));
        assert!(!host_only.matches(&url("http://www.kisssub.org/")));

        let domain = Cookie::parse("b=2; Domain=kisssub.org", &url("http://kisssub.org/")).unwrap();
        assert!(domain.matches(&url("http://www.kisssub.org/")));
        assert!(!domain.matches(&url("http://notkisssub.org/")));

        let scoped = Cookie::parse("c=3; Path=/api", &url("http://kisssub.org/")).unwrap();
        assert!(scoped.matches(&url("http://kisssub.org/api/x")));
        assert!(!scoped.matches(&url("http://kisssub.org/apix")));

        let secure = Cookie::parse("d=4; Secure", &url("https://kisssub.org/")).unwrap();
        assert!(!secure.matches(&url("http://kisssub.org/")));
    }

    #[test]
    fn test_persists_across_reopen() {
        let db = Database::open_in_memory().unwrap();
        let store = PersistentCookieStore::open(db.clone()).unwrap();
        let site = url("http://kisssub.org/");

        store
            .save_from_response(
                [
                    "god_mode=1; Max-Age=3600; Path=/",
                    "session=xyz; Path=/",
                ],
                &site,
            )
            .unwrap();
        assert_eq!(store.get_cookies(&site).len(), 2);

        let reopened = PersistentCookieStore::open(db).unwrap();
        let names: Vec<String> = reopened
            .get_cookies(&site)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["god_mode".to_string()]);
    }

    #[test]
    fn test_expired_cookie_removes_existing() {
        let store = store();
        let site = url("http://kisssub.org/");

        store.save_from_response(["a=1; Max-Age=60"], &site).unwrap();
        store.save_from_response(["a=; Max-Age=0"], &site).unwrap();

        assert!(store.get_cookies(&site).is_empty());
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_dump_format() {
        let store = store();
        let site = url("http://kisssub.org/");
        store.save_from_response(["god_mode=1; Path=/"], &site).unwrap();

        assert_eq!(store.dump(&site), "[god_mode=1; path=/]");
        assert_eq!(store.dump(&url("http://other.org/")), "[]");
    }

    #[test]
    fn test_cookie_store_trait() {
        use reqwest::cookie::CookieStore;

        let store = store();
        let site = url("http://kisssub.org/");
        let headers = [
            HeaderValue::from_static("a=1; Path=/"),
            HeaderValue::from_static("b=2; Path=/"),
        ];
        store.set_cookies(&mut headers.iter(), &site);

        let header = store.cookies(&site).unwrap();
        assert_eq!(header.to_str().unwrap(), "a=1; b=2");
        assert!(store.cookies(&url("http://other.org/")).is_none());
    }

    #[test]
    fn test_remove_for_and_clear() {
        let store = store();
        let site = url("http://kisssub.org/");
        store
            .save_from_response(["a=1; Max-Age=60", "b=2; Max-Age=60"], &site)
            .unwrap();
        store
            .save_from_response(["c=3; Max-Age=60"], &url("http://other.org/"))
            .unwrap();

        assert_eq!(store.remove_for(&site).unwrap(), 2);
        assert_eq!(store.all().len(), 1);

        store.clear().unwrap();
        assert!(store.all().is_empty());
    }
}
