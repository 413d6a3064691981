//! Incoming HTTP response.

use crate::base::error::ClientError;
use crate::message::headers::HeaderMap;
use crate::message::stream::Body;

#[derive(Debug)]
pub struct Response {
    version: String,
    status: u16,
    reason: String,
    headers: HeaderMap,
    body: Body,
}

impl Default for Response {
    /// An empty placeholder: status 0, no headers, empty body.
    fn default() -> Self {
        Self {
            version: "1.1".to_string(),
            status: 0,
            reason: String::new(),
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }
}

impl Response {
    pub fn new(status: u16) -> Result<Self, ClientError> {
        Self::default().with_status(status)
    }

    /// Parse a raw status line plus header lines (everything before the
    /// blank line). The body is attached separately.
    pub fn parse(header_block: &str) -> Result<Self, ClientError> {
        let mut lines = header_block.split("\r\n").filter(|l| !l.is_empty());
        let status_line = lines
            .next()
            .ok_or_else(|| ClientError::transport(-1, "empty response head"))?;

        // HTTP/1.1 200 OK
        let mut parts = status_line.splitn(3, ' ');
        let proto = parts.next().unwrap_or("");
        let version = proto
            .strip_prefix("HTTP/")
            .ok_or_else(|| ClientError::transport(-1, format!("bad status line: {status_line}")))?
            .to_string();
        let status: u16 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ClientError::transport(-1, format!("bad status line: {status_line}")))?;
        let reason = parts.next().unwrap_or("").to_string();

        let mut headers = HeaderMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.add(name.trim(), value.trim());
            }
        }

        let mut resp = Self::default().with_status(status)?;
        resp.version = version;
        if !reason.is_empty() {
            resp.reason = reason;
        }
        resp.headers = headers;
        Ok(resp)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The reason phrase from the wire, or the standard phrase for the
    /// status when the server sent none.
    pub fn reason(&self) -> &str {
        &self.reason
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

    /// Set the status, refreshing the reason phrase from the standard
    /// table. Codes outside 100..=599 are rejected.
    pub fn with_status(mut self, status: u16) -> Result<Self, ClientError> {
        if !(100..=599).contains(&status) {
            return Err(ClientError::InvalidStatus(status));
        }
        self.status = status;
        self.reason = reason_phrase(status).to_string();
        Ok(self)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// True for 3xx statuses that carry a `Location` header.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.headers.has("Location")
    }
}

/// The IANA reason phrase for a status code, empty when unassigned.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        507 => "Insufficient Storage",
        511 => "Network Authentication Required",
        _ => "",
    }
}
