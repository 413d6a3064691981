//! Raw-socket transport.
//!
//! One TCP (or TLS) connection per call, `Connection: close` on every
//! request, response framed by peer EOF. HTTP proxies get an absolute-URI
//! request line; SOCKS proxies are tunneled before the request is written,
//! with a TLS upgrade over the tunnel for https targets.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::base::error::ClientError;
use crate::client::options::Options;
use crate::handler::proxy::ProxyType;
use crate::handler::transport::{
    connect_tcp, decode_chunked, decode_gzip, find, tls_connect, SocketType,
};
use crate::message::{Request, Response};

pub struct SocketHandler;

impl SocketHandler {
    pub async fn send(request: &mut Request, options: &Options) -> Result<Response, ClientError> {
        let uri = request.uri().clone();
        let https = uri.scheme() == "https";
        let target_host = uri.host().to_string();
        let target_port = uri.port_or_default();

        let (connect_host, connect_port) = match &options.proxy {
            Some(proxy) => (proxy.host.clone(), proxy.port),
            None => (target_host.clone(), target_port),
        };
        let stream = connect_tcp(&connect_host, connect_port, options.timeout, options.bindto)
            .await?;

        let http_proxy = options
            .proxy
            .as_ref()
            .is_some_and(|p| p.effective_type() == ProxyType::Http);
        let socks = options.proxy.as_ref().filter(|p| p.is_socks());

        let mut socket = if let Some(proxy) = socks {
            let mut stream = stream;
            proxy
                .socks_tunnel(&mut stream, &target_host, target_port)
                .await?;
            debug!(proxy = %proxy.host, target = %target_host, "socks tunnel established");
            if https {
                SocketType::Ssl(tls_connect(stream, &target_host, options.verify).await?)
            } else {
                SocketType::Tcp(stream)
            }
        } else if https && options.proxy.is_none() {
            SocketType::Ssl(tls_connect(stream, &target_host, options.verify).await?)
        } else {
            // Direct http, or an HTTP proxy: the proxy relays from the
            // absolute-URI request line, no tunnel is set up.
            SocketType::Tcp(stream)
        };

        // Request target: origin-form, absolute-URI through an HTTP proxy.
        let request_target = if http_proxy {
            uri.to_string()
        } else {
            request.request_target()
        };

        request.headers_mut().set("Connection", "close");
        if http_proxy {
            if let Some(auth) = options.proxy.as_ref().and_then(|p| p.auth_header()) {
                request.headers_mut().set("Proxy-Authorization", auth);
            }
        }

        let mut head = format!(
            "{} {} HTTP/{}\r\n",
            request.method(),
            request_target,
            request.version()
        );
        for line in request.headers().to_lines() {
            head.push_str(&line);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        socket
            .write_all(head.as_bytes())
            .await
            .map_err(|e| ClientError::io("write request head", &e))?;

        if options.upload {
            // Manual chunked framing, terminated by a zero-length chunk.
            let body = request.body_mut();
            body.rewind()?;
            loop {
                let chunk = body.read(8192)?;
                let frame = format!("{:x}\r\n", chunk.len());
                socket
                    .write_all(frame.as_bytes())
                    .await
                    .map_err(|e| ClientError::io("write chunk", &e))?;
                socket
                    .write_all(&chunk)
                    .await
                    .map_err(|e| ClientError::io("write chunk", &e))?;
                socket
                    .write_all(b"\r\n")
                    .await
                    .map_err(|e| ClientError::io("write chunk", &e))?;
                if chunk.is_empty() {
                    break;
                }
            }
        } else {
            let mut payload = request.body_mut().contents()?;
            payload.extend_from_slice(b"\r\n\r\n");
            socket
                .write_all(&payload)
                .await
                .map_err(|e| ClientError::io("write request body", &e))?;
        }
        socket
            .flush()
            .await
            .map_err(|e| ClientError::io("flush request", &e))?;

        // Read until EOF. Some SOCKS servers reset https tunnels instead
        // of closing them; keep whatever arrived before the error.
        let mut raw = Vec::new();
        if let Err(e) = socket.read_to_end(&mut raw).await {
            if raw.is_empty() {
                return Err(ClientError::io("read response", &e));
            }
            warn!(error = %e, received = raw.len(), "read ended early, using partial response");
        }

        let split = find(&raw, b"\r\n\r\n")
            .ok_or_else(|| ClientError::transport(-1, "no header terminator in response"))?;
        let head_text = String::from_utf8_lossy(&raw[..split]).into_owned();
        let mut body = raw[split + 4..].to_vec();

        let response = Response::parse(&head_text)?;

        if response
            .headers()
            .line("Transfer-Encoding")
            .eq_ignore_ascii_case("chunked")
        {
            body = decode_chunked(&body)?;
        }
        if response
            .headers()
            .line("Content-Encoding")
            .eq_ignore_ascii_case("gzip")
        {
            body = decode_gzip(&body)?;
        }
        if options.nobody {
            body.clear();
        }

        Ok(response.with_body(body))
    }
}
