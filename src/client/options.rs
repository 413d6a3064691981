//! Typed client configuration.
//!
//! Every recognized option is a struct field with a validated setter;
//! anything else lands verbatim in the extra-option bag. Validation fails
//! fast with [`ClientError::InvalidOption`] before any I/O happens.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use http::Method;
use zeroize::Zeroizing;

use crate::base::error::ClientError;
use crate::cookies::JarHandle;
use crate::handler::proxy::{Proxy, ProxyType};
use crate::handler::HandlerChoice;
use crate::message::HeaderMap;
use crate::mime;

/// Redirect-following policy: off, unlimited, or capped at a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowRedirects {
    #[default]
    None,
    Unlimited,
    Max(u32),
}

impl FollowRedirects {
    /// Whether another hop is allowed once `redirected` redirects have
    /// already been taken.
    pub fn allows(&self, redirected: u32) -> bool {
        match self {
            FollowRedirects::None => false,
            FollowRedirects::Unlimited => true,
            FollowRedirects::Max(n) => *n >= redirected,
        }
    }
}

/// Basic-auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: Zeroizing<String>,
}

#[derive(Debug)]
pub enum PartData {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// One multipart form part.
#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    /// Extra part headers, rendered before `Content-Disposition`.
    pub headers: Vec<(String, String)>,
    pub data: PartData,
}

/// The full option record owned by one client instance.
#[derive(Debug)]
pub struct Options {
    pub method: Method,
    pub protocol_version: String,
    pub header: HeaderMap,
    pub body: Vec<u8>,
    pub body_as_json: bool,
    pub query: Vec<(String, String)>,
    pub form_param: Vec<(String, String)>,
    pub multipart: Vec<Part>,
    /// Add the browser-like default header set.
    pub default_header: bool,
    /// Stream the body with chunked framing instead of buffering.
    pub upload: bool,
    /// Local address to bind outgoing connections to.
    pub bindto: Option<IpAddr>,
    pub proxy: Option<Proxy>,
    pub auth: Option<Credentials>,
    pub cookie_jar: Option<JarHandle>,
    /// Connect timeout; the read phase is not limited.
    pub timeout: Duration,
    /// Fetch headers only, discarding any body.
    pub nobody: bool,
    pub follow_redirects: FollowRedirects,
    pub handler: HandlerChoice,
    /// Verify TLS peer certificates.
    pub verify: bool,
    /// Unrecognized options, kept verbatim.
    pub extra: BTreeMap<String, String>,
    /// Raw transport-specific switches passed through to the handler.
    pub transport: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            method: Method::GET,
            protocol_version: "1.1".to_string(),
            header: HeaderMap::new(),
            body: Vec::new(),
            body_as_json: false,
            query: Vec::new(),
            form_param: Vec::new(),
            multipart: Vec::new(),
            default_header: true,
            upload: false,
            bindto: None,
            proxy: None,
            auth: None,
            cookie_jar: None,
            timeout: Duration::from_secs(10),
            nobody: false,
            follow_redirects: FollowRedirects::None,
            handler: HandlerChoice::Auto,
            verify: true,
            extra: BTreeMap::new(),
            transport: BTreeMap::new(),
        }
    }
}

/// The header set a browser would send by default.
pub fn general_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Encoding", "gzip, deflate"),
        ("Accept-Language", "en-US,en;q=0.5"),
        (
            "User-Agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.11; rv:45.0) Gecko/20100101 Firefox/45.0",
        ),
    ]
}

impl Options {
    pub fn set_method(&mut self, method: &str) -> Result<(), ClientError> {
        let upper = method.to_ascii_uppercase();
        self.method = Method::from_bytes(upper.as_bytes())
            .map_err(|_| ClientError::invalid_option("method", format!("bad method {method:?}")))?;
        Ok(())
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ClientError> {
        if timeout.is_zero() {
            return Err(ClientError::invalid_option(
                "timeout",
                "must be greater than zero",
            ));
        }
        self.timeout = timeout;
        Ok(())
    }

    pub fn set_follow_redirects(&mut self, follow: FollowRedirects) {
        self.follow_redirects = follow;
    }

    /// Append query parameters; existing entries are preserved.
    pub fn add_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.push((name.into(), value.into()));
    }

    pub fn add_form_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.form_param.push((name.into(), value.into()));
    }

    /// Add a multipart part; a part with the same name is replaced.
    pub fn add_multipart(&mut self, part: Part) {
        if let Some(existing) = self.multipart.iter_mut().find(|p| p.name == part.name) {
            *existing = part;
        } else {
            self.multipart.push(part);
        }
    }

    /// Add a file part: `Content-Transfer-Encoding: binary`, content type
    /// from the extension, filename defaulting to the path basename.
    pub fn add_form_file(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        filename: Option<String>,
    ) {
        let path = path.into();
        let basename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let headers = vec![
            (
                "Content-Transfer-Encoding".to_string(),
                "binary".to_string(),
            ),
            (
                "Content-Type".to_string(),
                mime::guess_type(&path.to_string_lossy()).to_string(),
            ),
        ];
        self.add_multipart(Part {
            name: name.into(),
            filename: filename.or(Some(basename)),
            headers,
            data: PartData::File(path),
        });
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body_as_json = false;
        self.body = body.into();
    }

    /// Set a JSON body from a value already known to be valid.
    pub fn set_json_value(&mut self, value: &serde_json::Value) {
        self.body_as_json = true;
        self.body = value.to_string().into_bytes();
    }

    /// Set a JSON body from a string, rejecting anything that does not
    /// parse as JSON.
    pub fn set_json(&mut self, json: &str) -> Result<(), ClientError> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            ClientError::invalid_option("json", format!("not a valid json document: {e}"))
        })?;
        self.set_json_value(&value);
        Ok(())
    }

    pub fn set_auth(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.auth = Some(Credentials {
            user: user.into(),
            password: Zeroizing::new(password.into()),
        });
    }

    /// Configure a proxy from `host:port`, optional `user:pass`, and a
    /// protocol type.
    pub fn set_proxy(
        &mut self,
        address: &str,
        userpwd: Option<&str>,
        proxy_type: ProxyType,
    ) -> Result<(), ClientError> {
        let mut proxy = Proxy::new(address)?.with_type(proxy_type);
        if let Some(userpwd) = userpwd {
            proxy = proxy.with_userpwd(userpwd)?;
        }
        self.proxy = Some(proxy);
        Ok(())
    }

    pub fn clear_proxy(&mut self) {
        self.proxy = None;
    }
}
