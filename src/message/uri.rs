//! Immutable URI value type.
//!
//! Absolute URIs are parsed through the `url` crate; relative references
//! (as they appear in `Location` headers) are split locally. Every mutator
//! returns a new value.

use crate::base::error::ClientError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;

/// RFC3986 unreserved characters stay verbatim, everything else is encoded.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    userinfo: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
}

impl Uri {
    /// Parse an absolute URI or a relative reference.
    pub fn parse(input: &str) -> Result<Self, ClientError> {
        if input.contains("://") {
            let url = url::Url::parse(input).map_err(|e| ClientError::InvalidUri(e.to_string()))?;
            let userinfo = match (url.username(), url.password()) {
                ("", None) => String::new(),
                (user, None) => user.to_string(),
                (user, Some(pass)) => format!("{user}:{pass}"),
            };
            Ok(Self {
                scheme: url.scheme().to_string(),
                userinfo,
                host: url.host_str().unwrap_or("").to_string(),
                port: url.port(),
                path: url.path().to_string(),
                query: url.query().unwrap_or("").to_string(),
                fragment: url.fragment().unwrap_or("").to_string(),
            })
        } else {
            // Relative reference: [path][?query][#fragment]
            let (rest, fragment) = match input.split_once('#') {
                Some((r, f)) => (r, f),
                None => (input, ""),
            };
            let (path, query) = match rest.split_once('?') {
                Some((p, q)) => (p, q),
                None => (rest, ""),
            };
            Ok(Self {
                path: path.to_string(),
                query: query.to_string(),
                fragment: fragment.to_string(),
                ..Self::default()
            })
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn userinfo(&self) -> &str {
        &self.userinfo
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The explicit port, or the scheme default (443 for https, else 80).
    pub fn port_or_default(&self) -> u16 {
        self.port
            .unwrap_or(if self.scheme == "https" { 443 } else { 80 })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// `[userinfo@]host[:port]`, empty when no host is present.
    pub fn authority(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        if !self.userinfo.is_empty() {
            out.push_str(&self.userinfo);
            out.push('@');
        }
        out.push_str(&self.host);
        if let Some(port) = self.port {
            out.push_str(&format!(":{port}"));
        }
        out
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into().to_ascii_lowercase();
        self
    }

    pub fn with_userinfo(mut self, user: &str, password: Option<&str>) -> Self {
        self.userinfo = match password {
            Some(pass) if !user.is_empty() => format!("{user}:{pass}"),
            _ => user.to_string(),
        };
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().to_ascii_lowercase();
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = fragment.into();
        self
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        let authority = self.authority();
        if !authority.is_empty() {
            write!(f, "//{authority}")?;
        }
        if !self.path.is_empty() {
            if authority.is_empty() {
                write!(f, "{}", self.path)?;
            } else {
                // With an authority the path starts with exactly one slash.
                write!(f, "/{}", self.path.trim_start_matches('/'))?;
            }
        }
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// Percent-encode one query or cookie component per RFC3986.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Percent-decode, replacing invalid UTF-8 lossily.
pub fn decode_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Build an RFC3986-encoded, ampersand-joined query string.
pub fn build_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Split a query string into decoded pairs. Entries without `=` keep an
/// empty value.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        let uri = Uri::parse("http://user:pw@example.com:8080/a/b?x=1#frag").unwrap();
        assert_eq!(uri.scheme(), "http");
        assert_eq!(uri.userinfo(), "user:pw");
        assert_eq!(uri.host(), "example.com");
        assert_eq!(uri.port(), Some(8080));
        assert_eq!(uri.path(), "/a/b");
        assert_eq!(uri.query(), "x=1");
        assert_eq!(uri.fragment(), "frag");
    }

    #[test]
    fn test_roundtrip() {
        for s in [
            "http://example.com/",
            "https://example.com/path?a=1&b=2#top",
            "http://user:pw@example.com:8080/a/b?x=1#frag",
            "http://example.com:9000/x",
        ] {
            let uri = Uri::parse(s).unwrap();
            assert_eq!(uri.to_string(), s, "roundtrip failed for {s}");
        }
    }

    #[test]
    fn test_default_port_elided() {
        let uri = Uri::parse("http://example.com:80/x").unwrap();
        // The url crate treats scheme-default ports as absent.
        assert_eq!(uri.port(), None);
        assert_eq!(uri.port_or_default(), 80);
        assert_eq!(Uri::parse("https://e.com/").unwrap().port_or_default(), 443);
    }

    #[test]
    fn test_parse_relative() {
        let uri = Uri::parse("/a/b?x=1").unwrap();
        assert_eq!(uri.scheme(), "");
        assert_eq!(uri.path(), "/a/b");
        assert_eq!(uri.query(), "x=1");
        assert_eq!(uri.to_string(), "/a/b?x=1");
    }

    #[test]
    fn test_path_normalized_with_authority() {
        let uri = Uri::parse("http://example.com/x")
            .unwrap()
            .with_path("//double/slash");
        assert_eq!(uri.to_string(), "http://example.com/double/slash");

        let uri = Uri::parse("http://example.com/x").unwrap().with_path("rel");
        assert_eq!(uri.to_string(), "http://example.com/rel");
    }

    #[test]
    fn test_build_query_rfc3986() {
        let pairs = vec![
            ("a b".to_string(), "c d".to_string()),
            ("k".to_string(), "v/w".to_string()),
        ];
        assert_eq!(build_query(&pairs), "a%20b=c%20d&k=v%2Fw");
    }

    #[test]
    fn test_parse_query() {
        let pairs = parse_query("a=1&b=two%20words&flag");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two words".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }
}
