//! Outgoing HTTP request.

use http::Method;

use crate::base::error::ClientError;
use crate::message::headers::HeaderMap;
use crate::message::stream::Body;
use crate::message::uri::Uri;

/// The verbs the convenience constructors accept.
const KNOWN_METHODS: &[&str] = &[
    "OPTIONS", "GET", "HEAD", "POST", "PUT", "DELETE", "TRACE", "CONNECT",
];

#[derive(Debug, Default)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: String,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// A GET request for `uri` with a `Host` header derived from it.
    pub fn new(uri: Uri) -> Self {
        let mut req = Self {
            method: Method::GET,
            version: "1.1".to_string(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            uri: Uri::default(),
        };
        req.set_uri(uri);
        req
    }

    /// Build a request for any of the standard verbs. The name is
    /// case-insensitive; anything outside the standard set is rejected.
    pub fn with_method_name(method: &str, uri: Uri) -> Result<Self, ClientError> {
        let upper = method.to_ascii_uppercase();
        if !KNOWN_METHODS.contains(&upper.as_str()) {
            return Err(ClientError::UnknownMethod(method.to_string()));
        }
        let method = Method::from_bytes(upper.as_bytes())
            .map_err(|_| ClientError::UnknownMethod(method.to_string()))?;
        Ok(Self::new(uri).with_method(method))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Protocol version as it appears on the request line, e.g. `"1.1"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replace the target URI and refresh the `Host` header from it.
    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.set_uri(uri);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_added_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// The origin-form request target: path plus query, `/` when the path
    /// is empty.
    pub fn request_target(&self) -> String {
        let path = if self.uri.path().is_empty() {
            "/"
        } else {
            self.uri.path()
        };
        if self.uri.query().is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.uri.query())
        }
    }

    fn set_uri(&mut self, uri: Uri) {
        if !uri.host().is_empty() {
            let host = match uri.port() {
                Some(port) => format!("{}:{port}", uri.host()),
                None => uri.host().to_string(),
            };
            self.headers.set("Host", host);
        }
        self.uri = uri;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_host_header() {
        let req = Request::new(Uri::parse("http://example.com:8080/a").unwrap());
        assert_eq!(req.headers().line("Host"), "example.com:8080");
        assert_eq!(req.method(), &Method::GET);

        let req = Request::new(Uri::parse("http://example.com/a").unwrap());
        assert_eq!(req.headers().line("Host"), "example.com");
    }

    #[test]
    fn test_with_uri_refreshes_host() {
        let req = Request::new(Uri::parse("http://one.test/").unwrap())
            .with_uri(Uri::parse("http://two.test/").unwrap());
        assert_eq!(req.headers().line("Host"), "two.test");
    }

    #[test]
    fn test_request_target() {
        let req = Request::new(Uri::parse("http://e.com/a/b?x=1").unwrap());
        assert_eq!(req.request_target(), "/a/b?x=1");

        let req = Request::new(Uri::parse("http://e.com").unwrap());
        assert_eq!(req.request_target(), "/");
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = Request::with_method_name("BREW", Uri::default()).unwrap_err();
        assert!(matches!(err, ClientError::UnknownMethod(m) if m == "BREW"));
    }

    #[test]
    fn test_method_name_case_insensitive() {
        let req = Request::with_method_name("post", Uri::default()).unwrap();
        assert_eq!(req.method(), &Method::POST);
    }
}
