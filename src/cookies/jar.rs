//! In-memory cookie jar.

use time::OffsetDateTime;
use tracing::debug;

use crate::cookies::cookie::Cookie;
use crate::message::response::Response;

/// Stores cookies keyed by `(name, domain, path)`, evicting expired
/// entries lazily on read.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cookie. An existing cookie with the same name, canonical
    /// domain, and path is replaced when the incoming value differs or the
    /// incoming expiry is not earlier; a session cookie re-sent with an
    /// unchanged value never displaces a persistent one.
    pub fn add(&mut self, cookie: Cookie) {
        if let Some(existing) = self.cookies.iter_mut().find(|c| {
            c.name == cookie.name
                && c.canonical_domain() == cookie.canonical_domain()
                && c.path == cookie.path
        }) {
            // Option ordering: None < Some, so a dated expiry wins over a
            // session cookie when the value is unchanged.
            if cookie.value != existing.value || cookie.expires >= existing.expires {
                *existing = cookie;
            }
            return;
        }
        self.cookies.push(cookie);
    }

    /// Ingest every `Set-Cookie` header on a response. Cookies without a
    /// `Domain` attribute are scoped to `default_domain`.
    pub fn from_response(&mut self, response: &Response, default_domain: &str) {
        for line in response.headers().get("Set-Cookie") {
            match Cookie::from_set_cookie(line, default_domain) {
                Some(cookie) => self.add(cookie),
                None => debug!(line = %line, "ignoring unparseable Set-Cookie"),
            }
        }
    }

    /// Ingest a raw `Cookie` request header as session cookies for the
    /// given domain and path.
    pub fn from_string(&mut self, header: &str, domain: &str, path: &str) {
        for cookie in Cookie::from_string(header, domain, path) {
            self.add(cookie);
        }
    }

    /// Cookies applicable to a request, rendered as a `Cookie` header
    /// value of `name=value;` pairs joined by spaces. Expired entries are
    /// evicted first; `secure`-only cookies are included only for secure
    /// requests.
    pub fn header_for(&mut self, host: &str, path: &str, secure: bool) -> String {
        self.get_for(host, path, secure)
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get_for(&mut self, host: &str, path: &str, secure: bool) -> Vec<&Cookie> {
        self.evict_expired();
        self.cookies
            .iter()
            .filter(|c| c.matches_domain(host) && c.matches_path(path) && (secure || !c.secure))
            .collect()
    }

    /// Number of live cookies.
    pub fn count(&mut self) -> usize {
        self.evict_expired();
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Snapshot of the stored cookies, expired entries included.
    pub fn to_vec(&self) -> Vec<Cookie> {
        self.cookies.clone()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    fn evict_expired(&mut self) {
        let now = OffsetDateTime::now_utc();
        self.cookies.retain(|c| !c.is_expired(now));
    }
}

impl std::fmt::Display for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .cookies
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{rendered}")
    }
}
