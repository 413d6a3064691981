//! The request lifecycle engine.
//!
//! A `Client` owns one option set and drives the full exchange: compile
//! the options into an immutable request, resolve a transport, then run
//! the send/redirect/cookie loop. Errors raised while the loop is running
//! are stored on the client, never thrown; the request/response history
//! stays inspectable either way.

pub mod options;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::base::error::ClientError;
use crate::cookies::JarHandle;
use crate::handler::proxy::ProxyType;
use crate::handler::{self, HandlerChoice};
use crate::message::stream::AppendStream;
use crate::message::uri::build_query;
use crate::message::{Body, Request, Response, Stream, Uri};
use options::{FollowRedirects, Options, Part, PartData};

/// Wall-clock and elapsed timing of the last `send()`.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub start: SystemTime,
    pub end: SystemTime,
    pub elapsed: Duration,
}

pub struct Client {
    options: Options,
    /// The URI as constructed, the pristine seed every compilation starts
    /// from.
    uri: Uri,
    requests: Vec<Request>,
    responses: Vec<Response>,
    error: Option<ClientError>,
    timing: Option<Timing>,
}

impl Client {
    /// A GET client for the given URL.
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let uri = Uri::parse(url)?;
        Ok(Self {
            options: Options::default(),
            requests: vec![Request::new(uri.clone())],
            uri,
            responses: Vec::new(),
            error: None,
            timing: None,
        })
    }

    /// A client for an arbitrary verb; unrecognized verbs are rejected
    /// with [`ClientError::UnknownMethod`].
    pub fn request(url: &str, method: &str) -> Result<Self, ClientError> {
        let uri = Uri::parse(url)?;
        let request = Request::with_method_name(method, uri.clone())?;
        let mut client = Self {
            options: Options::default(),
            requests: vec![request],
            uri,
            responses: Vec::new(),
            error: None,
            timing: None,
        };
        client.options.method = client.requests[0].method().clone();
        Ok(client)
    }

    pub fn get(url: &str) -> Result<Self, ClientError> {
        Self::request(url, "GET")
    }

    pub fn head(url: &str) -> Result<Self, ClientError> {
        Self::request(url, "HEAD")
    }

    pub fn post(url: &str) -> Result<Self, ClientError> {
        Self::request(url, "POST")
    }

    pub fn put(url: &str) -> Result<Self, ClientError> {
        Self::request(url, "PUT")
    }

    pub fn delete(url: &str) -> Result<Self, ClientError> {
        Self::request(url, "DELETE")
    }

    pub fn trace(url: &str) -> Result<Self, ClientError> {
        Self::request(url, "TRACE")
    }

    // ---- fluent option surface -------------------------------------------

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.add_query(name, value);
        self
    }

    pub fn with_form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.add_form_param(name, value);
        self
    }

    /// Add a multipart part; forces multipart encoding for the request.
    pub fn with_multipart(
        mut self,
        name: impl Into<String>,
        contents: impl Into<Vec<u8>>,
        filename: Option<String>,
    ) -> Self {
        self.options.add_multipart(Part {
            name: name.into(),
            filename,
            headers: Vec::new(),
            data: PartData::Bytes(contents.into()),
        });
        self
    }

    pub fn with_form_file(
        mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        filename: Option<String>,
    ) -> Self {
        self.options.add_form_file(name, path, filename);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.options.set_body(body);
        self
    }

    /// JSON body from a string; rejects strings that are not valid JSON.
    pub fn with_json(mut self, json: &str) -> Result<Self, ClientError> {
        self.options.set_json(json)?;
        Ok(self)
    }

    pub fn with_json_value(mut self, value: &serde_json::Value) -> Self {
        self.options.set_json_value(value);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.options.header.set(name, value);
        self
    }

    pub fn with_added_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.options.header.add(name, value);
        self
    }

    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.set_auth(user, password);
        self
    }

    pub fn with_proxy(
        mut self,
        address: &str,
        userpwd: Option<&str>,
        proxy_type: ProxyType,
    ) -> Result<Self, ClientError> {
        self.options.set_proxy(address, userpwd, proxy_type)?;
        Ok(self)
    }

    pub fn with_http_proxy(self, address: &str, userpwd: Option<&str>) -> Result<Self, ClientError> {
        self.with_proxy(address, userpwd, ProxyType::Http)
    }

    pub fn with_socks5_proxy(
        self,
        address: &str,
        userpwd: Option<&str>,
    ) -> Result<Self, ClientError> {
        self.with_proxy(address, userpwd, ProxyType::Socks5)
    }

    pub fn with_socks4_proxy(self, address: &str) -> Result<Self, ClientError> {
        self.with_proxy(address, None, ProxyType::Socks4)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ClientError> {
        self.options.set_timeout(timeout)?;
        Ok(self)
    }

    pub fn with_follow_redirects(mut self, follow: FollowRedirects) -> Self {
        self.options.set_follow_redirects(follow);
        self
    }

    pub fn with_default_header(mut self, enabled: bool) -> Self {
        self.options.default_header = enabled;
        self
    }

    pub fn with_upload(mut self, enabled: bool) -> Self {
        self.options.upload = enabled;
        self
    }

    pub fn with_nobody(mut self, enabled: bool) -> Self {
        self.options.nobody = enabled;
        self
    }

    pub fn with_bindto(mut self, address: IpAddr) -> Self {
        self.options.bindto = Some(address);
        self
    }

    pub fn with_cookie_jar(mut self, jar: JarHandle) -> Self {
        self.options.cookie_jar = Some(jar);
        self
    }

    pub fn with_handler(mut self, handler: HandlerChoice) -> Self {
        self.options.handler = handler;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.options.verify = verify;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.options.protocol_version = version.into();
        self
    }

    // ---- accessors -------------------------------------------------------

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// The most recent request, compiled or sent.
    pub fn last_request(&self) -> Option<&Request> {
        self.requests.last()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// The last response received, if any.
    pub fn response(&self) -> Option<&Response> {
        self.responses.last()
    }

    /// Mutable access to the last response, needed to read its body.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.responses.last_mut()
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// The URI of the most recent request, after any redirects.
    pub fn current_uri(&self) -> Option<&Uri> {
        self.requests.last().map(|r| r.uri())
    }

    /// The error captured during the last send loop, if any.
    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn timing(&self) -> Option<&Timing> {
        self.timing.as_ref()
    }

    pub fn cookie_jar(&self) -> Option<&JarHandle> {
        self.options.cookie_jar.as_ref()
    }

    // ---- the send loop ---------------------------------------------------

    /// Compile and send, following redirects per the configured policy.
    ///
    /// Option-compilation and handler-resolution failures return `Err`.
    /// Anything that goes wrong after the loop starts is captured in
    /// [`error()`](Client::error) instead; the return value is then the
    /// last response received before the failure, possibly `None`.
    pub async fn send(&mut self) -> Result<Option<&Response>, ClientError> {
        let mut request = self.prepare_request()?;
        let handler = handler::resolve(&self.options.handler)?;

        let start = SystemTime::now();
        let clock = Instant::now();
        self.error = None;
        self.responses.clear();
        let mut redirected: u32 = 0;

        loop {
            let host = request.uri().host().to_string();
            let path = request.uri().path().to_string();
            let secure = request.uri().scheme() == "https";

            if let Some(jar) = self.options.cookie_jar.as_mut() {
                let cookie_header = jar.jar_mut().header_for(&host, &path, secure);
                if !cookie_header.is_empty() {
                    request = request.with_header("Cookie", cookie_header);
                }
            }

            let index = redirected as usize;
            if index < self.requests.len() {
                self.requests[index] = request;
                self.requests.truncate(index + 1);
            } else {
                self.requests.push(request);
            }

            match handler
                .send(&mut self.requests[index], &self.options)
                .await
            {
                Ok(response) => {
                    if let Some(jar) = self.options.cookie_jar.as_mut() {
                        jar.jar_mut().from_response(&response, &host);
                    }
                    let has_redirect = response.headers().has("Location");
                    self.responses.push(response);

                    if !has_redirect {
                        break;
                    }
                    redirected += 1;
                    if !self.options.follow_redirects.allows(redirected) {
                        break;
                    }
                    match self.prepare_follow_redirect(index) {
                        Ok(next) => {
                            debug!(
                                target = %next.uri(),
                                hop = redirected,
                                "following redirect"
                            );
                            request = next;
                        }
                        Err(e) => {
                            self.error = Some(e);
                            break;
                        }
                    }
                }
                Err(e) => {
                    self.error = Some(e);
                    break;
                }
            }
        }

        let end = SystemTime::now();
        self.timing = Some(Timing {
            start,
            end,
            elapsed: clock.elapsed(),
        });

        Ok(self.responses.last())
    }

    /// Compile the option set into the wire-ready first request. Always
    /// starts from the URI the client was constructed with, so repeated
    /// sends compile the same request.
    fn prepare_request(&mut self) -> Result<Request, ClientError> {
        let seed = Request::new(self.uri.clone());

        // Merge query options into the URI, preserving any existing query.
        let extra_query = build_query(&self.options.query);
        let merged = match (seed.uri().query(), extra_query.as_str()) {
            (existing, "") => existing.to_string(),
            ("", extra) => extra.to_string(),
            (existing, extra) => format!("{existing}&{extra}"),
        };
        let uri = seed.uri().clone().with_query(merged);

        let mut request = seed
            .with_version(self.options.protocol_version.clone())
            .with_method(self.options.method.clone())
            .with_uri(uri);

        if let Some(auth) = &self.options.auth {
            let creds = format!("{}:{}", auth.user, auth.password.as_str());
            let encoded = general_purpose::STANDARD.encode(creds);
            request = request.with_header("Authorization", format!("Basic {encoded}"));
        }

        if self.options.default_header {
            for (name, value) in options::general_headers() {
                if !self.options.header.has(name) {
                    self.options.header.set(name, value);
                }
            }
        }

        for (name, values) in self.options.header.iter() {
            request
                .headers_mut()
                .set_all(name, values.to_vec());
        }

        if !self.options.multipart.is_empty() {
            let boundary = generate_boundary();
            self.options.upload = true;

            if !request.headers().has("Content-Type") {
                request = request.with_header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                );
            }

            // Form params become additional parts.
            let form_params = std::mem::take(&mut self.options.form_param);
            for (name, value) in form_params {
                self.options.add_multipart(Part {
                    name,
                    filename: None,
                    headers: Vec::new(),
                    data: PartData::Bytes(value.into_bytes()),
                });
            }

            let mut stream = AppendStream::new();
            for part in &self.options.multipart {
                stream.push(Stream::from_bytes(part_head(&boundary, part).into_bytes()));
                match &part.data {
                    PartData::Bytes(data) => stream.push(Stream::from_bytes(data.clone())),
                    PartData::File(path) => stream.push(Stream::open(&path.to_string_lossy())?),
                }
                stream.push(Stream::from_bytes(b"\r\n".to_vec()));
            }
            stream.push(Stream::from_bytes(
                format!("--{boundary}--\r\n").into_bytes(),
            ));
            request = request.with_body(Body::Append(stream));
        } else if !self.options.form_param.is_empty() || !self.options.body.is_empty() {
            if !self.options.form_param.is_empty() {
                self.options.body = build_query(&self.options.form_param).into_bytes();
            }

            if !request.headers().has("Content-Type") {
                request = request.with_header(
                    "Content-Type",
                    if self.options.body_as_json {
                        "application/json"
                    } else {
                        "application/x-www-form-urlencoded"
                    },
                );
            }
            if !request.headers().has("Content-Length") {
                request = request.with_header("Content-Length", self.options.body.len().to_string());
            }
            request = request.with_body(self.options.body.clone());
        }

        // Suppress the 100-continue probe whenever a body goes out.
        if !self.options.body.is_empty() || self.options.upload {
            request = request.with_header("Expect", "");
        }

        if self.options.upload {
            request = request
                .without_header("Content-Length")
                .with_header("Transfer-Encoding", "chunked");
        }

        if let Some(proxy) = &mut self.options.proxy {
            if proxy.proxy_type.is_none() {
                proxy.proxy_type = Some(ProxyType::Http);
            }
        }

        let jar = self.options.cookie_jar.get_or_insert_with(JarHandle::default);
        if request.headers().has("Cookie") {
            let cookie_line = request.headers().line("Cookie");
            jar.jar_mut()
                .from_string(&cookie_line, request.uri().host(), request.uri().path());
        }

        Ok(request)
    }

    /// Build the next hop of a redirect chain: GET, same protocol version,
    /// headers reset to the default set with the `User-Agent` carried over.
    fn prepare_follow_redirect(&self, index: usize) -> Result<Request, ClientError> {
        let previous = &self.requests[index];
        let response = self.responses.last().expect("redirect without response");
        let location = response.headers().line("Location");

        let uri = if location.contains("://") {
            Uri::parse(&location)?
        } else {
            let reference = Uri::parse(&location)?;
            let path = if location.starts_with('/') {
                reference.path().to_string()
            } else {
                // Relative to the directory of the current path.
                let base = previous.uri().path();
                let dir = &base[..base.rfind('/').map(|i| i + 1).unwrap_or(0)];
                format!("{dir}{}", reference.path())
            };
            previous
                .uri()
                .clone()
                .with_path(path)
                .with_query(reference.query())
                .with_fragment(reference.fragment())
        };

        let mut next = Request::new(uri)
            .with_method(http::Method::GET)
            .with_version(previous.version());

        if self.options.default_header {
            for (name, value) in options::general_headers() {
                next.headers_mut().set(name, value);
            }
        }
        let user_agent = previous.headers().line("User-Agent");
        if !user_agent.is_empty() {
            next.headers_mut().set("User-Agent", user_agent);
        }

        Ok(next)
    }
}

/// A unique-enough multipart boundary from the clock and pid.
fn generate_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("{:x}{:x}", nanos, std::process::id())
}

/// The opening of one multipart part: boundary, part headers, and the
/// `Content-Disposition` line, terminated by a blank line.
fn part_head(boundary: &str, part: &Part) -> String {
    let mut head = format!("--{boundary}\r\n");
    for (name, value) in &part.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!(
        "Content-Disposition: form-data; name=\"{}\"",
        part.name
    ));
    if let Some(filename) = &part.filename {
        head.push_str(&format!("; filename=\"{filename}\""));
    }
    head.push_str("\r\n\r\n");
    head
}
