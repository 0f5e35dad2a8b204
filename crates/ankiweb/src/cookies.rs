//! Session cookie storage.
//!
//! The jar collects `Set-Cookie` headers from every response, decides which
//! cookies go out with each request, and persists the whole set to a JSON
//! file so a later run can reuse the login.
//!
//! # Example
//!
//! ```no_run
//! use ankiweb::CookieJar;
//!
//! # fn example() -> ankiweb::Result<()> {
//! let path = std::path::Path::new("/tmp/anki.cookies");
//!
//! // A missing file is an empty jar.
//! let jar = CookieJar::load(path)?;
//! println!("{} cookies restored", jar.len());
//!
//! jar.save(path)?;
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use reqwest::Url;
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// A cookie as kept in the jar and in the cookie file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Host (host-only cookies) or domain the cookie belongs to.
    pub domain: String,
    /// Path prefix the cookie applies to.
    pub path: String,
    /// Whether the cookie is sent only to exactly `domain`.
    #[serde(default)]
    pub host_only: bool,
    /// Whether the cookie is sent only over https.
    #[serde(default)]
    pub secure: bool,
    /// Whether the cookie was marked `HttpOnly`.
    #[serde(default)]
    pub http_only: bool,
    /// Expiry as unix seconds; `None` for session cookies.
    #[serde(default)]
    pub expires: Option<i64>,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Whether this cookie should be sent with a request to `url`.
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        let domain_ok = if self.host_only {
            host.eq_ignore_ascii_case(&self.domain)
        } else {
            domain_match(host, &self.domain)
        };

        domain_ok && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }
}

/// In-memory cookie jar with file persistence.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a jar from `path`.
    ///
    /// A file that does not exist yields an empty jar. Cookies that expired
    /// since they were saved are dropped.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cookie file, starting empty session");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(Error::Persistence {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let cookies: Vec<StoredCookie> =
            serde_json::from_str(&contents).map_err(|source| Error::CookieFile {
                path: path.to_path_buf(),
                source,
            })?;

        let now = now();
        let cookies: Vec<_> = cookies.into_iter().filter(|c| !c.is_expired(now)).collect();
        debug!(path = %path.display(), count = cookies.len(), "Loaded cookies");

        Ok(Self { cookies })
    }

    /// Write every cookie to `path`, replacing the file whole.
    ///
    /// Parent directories are created as needed. The data goes to a private
    /// temporary file next to `path` which is then renamed over it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let persistence = |source: io::Error| Error::Persistence {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(persistence)?;

        let json = serde_json::to_vec_pretty(&self.cookies)?;

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(persistence)?;
        file.write_all(&json).map_err(persistence)?;
        file.as_file().sync_all().map_err(persistence)?;
        file.persist(path).map_err(|e| persistence(e.error))?;

        debug!(path = %path.display(), count = self.cookies.len(), "Saved cookies");
        Ok(())
    }

    /// Number of cookies in the jar.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterate over all stored cookies.
    pub fn iter(&self) -> impl Iterator<Item = &StoredCookie> {
        self.cookies.iter()
    }

    /// Look up a cookie by name that would be sent to `url`.
    pub fn get(&self, url: &Url, name: &str) -> Option<&StoredCookie> {
        let now = now();
        self.cookies
            .iter()
            .find(|c| c.name == name && !c.is_expired(now) && c.matches(url))
    }

    /// Record every `Set-Cookie` header of a response to `url`.
    pub fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            match value.to_str() {
                Ok(raw) => self.set_cookie(url, raw),
                Err(_) => trace!(url = %url, "Skipping non-ASCII Set-Cookie header"),
            }
        }
    }

    /// Record a single `Set-Cookie` header value received from `url`.
    ///
    /// Malformed headers and cookies for a foreign domain are ignored.
    pub fn set_cookie(&mut self, url: &Url, raw: &str) {
        let Some(host) = url.host_str() else {
            return;
        };

        let parsed = match cookie::Cookie::parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!(url = %url, error = %e, "Ignoring malformed cookie");
                return;
            }
        };

        let (domain, host_only) = match parsed.domain().map(|d| d.trim_start_matches('.')) {
            Some(domain) if !domain.is_empty() => {
                if !domain_match(host, domain) {
                    trace!(url = %url, domain, "Ignoring cookie for foreign domain");
                    return;
                }
                (domain.to_ascii_lowercase(), false)
            }
            _ => (host.to_ascii_lowercase(), true),
        };

        let path = match parsed.path() {
            Some(path) if path.starts_with('/') => path.to_string(),
            _ => default_path(url.path()),
        };

        let now = now();
        let expires = match parsed.max_age() {
            Some(max_age) => Some(now.saturating_add(max_age.whole_seconds())),
            None => parsed.expires_datetime().map(|t| t.unix_timestamp()),
        };

        let cookie = StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            host_only,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            expires,
        };

        self.cookies.retain(|c| !c.same_slot(&cookie));

        if cookie.is_expired(now) {
            trace!(name = %cookie.name, "Cookie removed by server");
            return;
        }

        trace!(name = %cookie.name, domain = %cookie.domain, "Stored cookie");
        self.cookies.push(cookie);
    }

    /// Build the `Cookie` header for a request to `url`.
    ///
    /// `explicit` is a `Cookie` header already set on the request; its
    /// cookies come first and a jar cookie with the same name is not added.
    /// Returns `None` when there is nothing to send.
    pub fn cookie_header(&self, url: &Url, explicit: Option<&str>) -> Option<String> {
        let mut pairs: Vec<String> = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        if let Some(explicit) = explicit {
            for pair in explicit.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let name = pair.split_once('=').map_or(pair, |(name, _)| name).trim();
                names.push(name);
                pairs.push(pair.to_string());
            }
        }

        let now = now();
        for cookie in &self.cookies {
            if cookie.is_expired(now) || !cookie.matches(url) || names.contains(&cookie.name.as_str())
            {
                continue;
            }
            names.push(&cookie.name);
            pairs.push(format!("{}={}", cookie.name, cookie.value));
        }

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn domain_match(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain
        || (host.ends_with(&domain) && host[..host.len() - domain.len()].ends_with('.'))
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}
