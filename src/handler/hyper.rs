//! Hyper-backed transport.
//!
//! Drives one `hyper` HTTP/1 connection over a socket we establish
//! ourselves, so proxy tunneling and TLS stay under our control. Buffered
//! bodies go out as `Full`; uploads stream as frames and hyper applies the
//! chunked framing.

use std::convert::Infallible;

use bytes::Bytes;
use futures::stream;
use http_body_util::{combinators::BoxBody, BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::base::error::ClientError;
use crate::client::options::Options;
use crate::handler::proxy::ProxyType;
use crate::handler::transport::{connect_tcp, decode_gzip, find, tls_connect, SocketType};
use crate::message::{Request, Response};

pub struct HyperHandler;

impl HyperHandler {
    pub async fn send(request: &mut Request, options: &Options) -> Result<Response, ClientError> {
        let uri = request.uri().clone();
        let https = uri.scheme() == "https";
        let target_host = uri.host().to_string();
        let target_port = uri.port_or_default();

        let (connect_host, connect_port) = match &options.proxy {
            Some(proxy) => (proxy.host.clone(), proxy.port),
            None => (target_host.clone(), target_port),
        };
        let mut stream = connect_tcp(&connect_host, connect_port, options.timeout, options.bindto)
            .await?;

        let http_proxy = options
            .proxy
            .as_ref()
            .is_some_and(|p| p.effective_type() == ProxyType::Http);
        // An http target through an HTTP proxy is relayed, not tunneled;
        // the proxy routes from the absolute-URI request line.
        let absolute_target = http_proxy && !https;

        if let Some(proxy) = &options.proxy {
            if proxy.is_socks() {
                proxy
                    .socks_tunnel(&mut stream, &target_host, target_port)
                    .await?;
                debug!(proxy = %proxy.host, target = %target_host, "socks tunnel established");
            } else if http_proxy && https {
                connect_tunnel(&mut stream, proxy.auth_header(), &target_host, target_port)
                    .await?;
            }
        }

        let socket = if https {
            SocketType::Ssl(tls_connect(stream, &target_host, options.verify).await?)
        } else {
            SocketType::Tcp(stream)
        };

        let hyper_request = build_request(request, options, absolute_target)?;

        let io = TokioIo::new(socket);
        let (mut sender, conn) = http1::Builder::new()
            .title_case_headers(true)
            .handshake::<_, BoxBody<Bytes, Infallible>>(io)
            .await
            .map_err(|e| ClientError::transport(-1, format!("http handshake: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let hyper_response = sender
            .send_request(hyper_request)
            .await
            .map_err(|e| ClientError::transport(-1, format!("send request: {e}")))?;

        let status = hyper_response.status().as_u16();
        let version = match hyper_response.version() {
            hyper::Version::HTTP_10 => "1.0",
            _ => "1.1",
        };

        let mut response = Response::default()
            .with_status(status)
            .map_err(|_| ClientError::transport(-1, format!("bad status from peer: {status}")))?
            .with_version(version);
        for (name, value) in hyper_response.headers() {
            response
                .headers_mut()
                .add(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let mut body = if options.nobody {
            Vec::new()
        } else {
            hyper_response
                .into_body()
                .collect()
                .await
                .map_err(|e| ClientError::transport(-1, format!("read response body: {e}")))?
                .to_bytes()
                .to_vec()
        };
        if response
            .headers()
            .line("Content-Encoding")
            .eq_ignore_ascii_case("gzip")
            && !body.is_empty()
        {
            body = decode_gzip(&body)?;
        }

        Ok(response.with_body(body))
    }
}

/// Map the message-model request into a hyper request.
fn build_request(
    request: &mut Request,
    options: &Options,
    absolute_target: bool,
) -> Result<hyper::Request<BoxBody<Bytes, Infallible>>, ClientError> {
    let target = if absolute_target {
        request.uri().to_string()
    } else {
        request.request_target()
    };

    let mut builder = hyper::Request::builder()
        .method(request.method().clone())
        .uri(target.as_str())
        .version(match request.version() {
            "1.0" => hyper::Version::HTTP_10,
            _ => hyper::Version::HTTP_11,
        });

    for (name, values) in request.headers().iter() {
        // hyper writes its own framing header for streamed bodies.
        if options.upload && name.eq_ignore_ascii_case("Transfer-Encoding") {
            continue;
        }
        for value in values {
            builder = builder.header(name, value.as_str());
        }
    }
    if absolute_target {
        if let Some(auth) = options.proxy.as_ref().and_then(|p| p.auth_header()) {
            builder = builder.header("Proxy-Authorization", auth);
        }
    }

    let body: BoxBody<Bytes, Infallible> = if options.upload {
        let raw = request.body_mut();
        raw.rewind()?;
        let mut frames = Vec::new();
        loop {
            let chunk = raw.read(8192)?;
            if chunk.is_empty() {
                break;
            }
            frames.push(Ok::<_, Infallible>(Frame::data(Bytes::from(chunk))));
        }
        BoxBody::new(StreamBody::new(stream::iter(frames)))
    } else {
        BoxBody::new(Full::new(Bytes::from(request.body_mut().contents()?)))
    };

    builder
        .body(body)
        .map_err(|e| ClientError::transport(-1, format!("build request: {e}")))
}

/// Establish an HTTP CONNECT tunnel through a proxy.
async fn connect_tunnel(
    stream: &mut tokio::net::TcpStream,
    auth: Option<String>,
    host: &str,
    port: u16,
) -> Result<(), ClientError> {
    let target = format!("{host}:{port}");
    let mut connect = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n");
    if let Some(auth) = auth {
        connect.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    connect.push_str("\r\n");

    stream
        .write_all(connect.as_bytes())
        .await
        .map_err(|e| ClientError::io("write connect", &e))?;

    // Read until the end of the proxy's response head.
    let mut reply = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| ClientError::io("read connect reply", &e))?;
        if n == 0 {
            return Err(ClientError::transport(-1, "proxy closed during connect"));
        }
        reply.extend_from_slice(&buf[..n]);
        if find(&reply, b"\r\n\r\n").is_some() {
            break;
        }
    }

    let head = String::from_utf8_lossy(&reply);
    let ok = head.starts_with("HTTP/1.1 200") || head.starts_with("HTTP/1.0 200");
    if !ok {
        let line = head.lines().next().unwrap_or("").to_string();
        return Err(ClientError::transport(
            -1,
            format!("proxy tunnel refused: {line}"),
        ));
    }
    Ok(())
}
