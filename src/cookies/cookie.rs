//! A single HTTP cookie with its scoping attributes.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::message::uri::{decode_component, encode_component};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Absolute expiry. `None` means a session cookie.
    #[serde(with = "time::serde::timestamp::option")]
    pub expires: Option<OffsetDateTime>,
    pub secure: bool,
    pub http_only: bool,
    /// Marked for discard at the end of the session regardless of expiry.
    pub discard: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
            discard: false,
        }
    }

    /// Parse one `Set-Cookie` line. `default_domain` scopes cookies whose
    /// `Domain` attribute is absent; a `Max-Age` is converted to an
    /// absolute expiry relative to now.
    pub fn from_set_cookie(line: &str, default_domain: &str) -> Option<Self> {
        let parsed = cookie::Cookie::parse_encoded(line).ok()?;
        let expires = if let Some(max_age) = parsed.max_age() {
            Some(OffsetDateTime::now_utc() + max_age)
        } else {
            parsed.expires_datetime()
        };
        // The Discard attribute is not modeled by the cookie crate.
        let discard = line
            .split(';')
            .any(|attr| attr.trim().eq_ignore_ascii_case("discard"));
        Some(Self {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain: parsed
                .domain()
                .unwrap_or(default_domain)
                .to_ascii_lowercase(),
            path: parsed.path().unwrap_or("/").to_string(),
            expires,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            discard,
        })
    }

    /// Parse a `Cookie` request header (`a=1; b=2`) into session cookies
    /// scoped to the given domain and path.
    pub fn from_string(header: &str, domain: &str, path: &str) -> Vec<Self> {
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                if name.is_empty() {
                    return None;
                }
                let mut c = Cookie::new(name, decode_component(value));
                c.domain = domain.to_ascii_lowercase();
                c.path = path.to_string();
                Some(c)
            })
            .collect()
    }

    /// Domain with any leading dot removed, the identity used for
    /// de-duplication and matching.
    pub fn canonical_domain(&self) -> &str {
        self.domain.trim_start_matches('.')
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires, Some(exp) if exp <= now)
    }

    /// RFC6265 domain-match: exact match always, suffix match only for
    /// non-IP hosts.
    pub fn matches_domain(&self, host: &str) -> bool {
        let own = self.canonical_domain();
        if own.is_empty() {
            return false;
        }
        let host = host.to_ascii_lowercase();
        if host == own {
            return true;
        }
        if host.parse::<std::net::IpAddr>().is_ok() {
            return false;
        }
        host.ends_with(&format!(".{own}"))
    }

    /// Path-match: the request path must have the cookie path as prefix.
    pub fn matches_path(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        path.starts_with(&self.path)
    }

}

impl fmt::Display for Cookie {
    /// `name=value;` with the value percent-encoded for the wire.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={};", self.name, encode_component(&self.value))
    }
}
