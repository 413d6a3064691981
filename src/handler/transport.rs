//! Shared transport plumbing: connect, TLS upgrade, body decoding.

use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use boring::ssl::{SslConnector, SslMethod, SslVerifyMode};
use flate2::read::{DeflateDecoder, GzDecoder};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};
use tracing::debug;

use crate::base::error::ClientError;

/// A connected socket, plain or TLS.
#[derive(Debug)]
pub enum SocketType {
    Tcp(TcpStream),
    Ssl(tokio_boring::SslStream<TcpStream>),
}

impl AsyncRead for SocketType {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketType {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_flush(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Resolve and connect, trying each resolved address in order. The
/// timeout covers connection establishment only; an optional bind address
/// pins the local interface.
pub async fn connect_tcp(
    host: &str,
    port: u16,
    timeout: Duration,
    bind: Option<IpAddr>,
) -> Result<TcpStream, ClientError> {
    let target = format!("{host}:{port}");
    let connect = async {
        let addrs = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| ClientError::io("resolve host", &e))?;

        let mut last_err = None;
        for addr in addrs {
            match connect_addr(addr, bind).await {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| ClientError::transport(-1, format!("no address for {target}"))))
    };

    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| ClientError::transport(-1, format!("connect to {target} timed out")))?
}

async fn connect_addr(addr: SocketAddr, bind: Option<IpAddr>) -> Result<TcpStream, ClientError> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|e| ClientError::io("create socket", &e))?;
    if let Some(ip) = bind {
        socket
            .bind(SocketAddr::new(ip, 0))
            .map_err(|e| ClientError::io("bind local address", &e))?;
    }
    socket
        .connect(addr)
        .await
        .map_err(|e| ClientError::io("connect", &e))
}

/// Upgrade a stream to TLS, negotiating http/1.1 via ALPN. SNI is set
/// only for non-IP hosts.
pub async fn tls_connect(
    stream: TcpStream,
    host: &str,
    verify: bool,
) -> Result<tokio_boring::SslStream<TcpStream>, ClientError> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| ClientError::transport(-1, format!("tls init: {e}")))?;
    builder
        .set_alpn_protos(b"\x08http/1.1")
        .map_err(|e| ClientError::transport(-1, format!("tls alpn: {e}")))?;
    if !verify {
        builder.set_verify(SslVerifyMode::NONE);
    }

    let mut config = builder
        .build()
        .configure()
        .map_err(|e| ClientError::transport(-1, format!("tls configure: {e}")))?;
    if host.parse::<IpAddr>().is_ok() {
        config.set_use_server_name_indication(false);
        config.set_verify_hostname(false);
    }

    tokio_boring::connect(config, host, stream)
        .await
        .map_err(|e| ClientError::transport(-1, format!("tls handshake with {host}: {e}")))
}

/// Decode chunked transfer framing: hex length line, CRLF, payload, CRLF,
/// repeated until a zero-length chunk. Trailers are discarded.
pub fn decode_chunked(data: &[u8]) -> Result<Vec<u8>, ClientError> {
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        // The peer may close mid-chunk; stepping over the payload CRLF can
        // leave pos past the end of a truncated body.
        if pos > data.len() {
            return Err(ClientError::transport(-1, "truncated chunk payload"));
        }
        let line_end = find(&data[pos..], b"\r\n")
            .ok_or_else(|| ClientError::transport(-1, "truncated chunk size line"))?;
        let size_line = &data[pos..pos + line_end];
        // Chunk extensions after ';' are ignored.
        let size_str = std::str::from_utf8(size_line)
            .map_err(|_| ClientError::transport(-1, "invalid chunk size line"))?
            .split(';')
            .next()
            .unwrap_or("")
            .trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| ClientError::transport(-1, format!("bad chunk size {size_str:?}")))?;
        pos += line_end + 2;
        if size == 0 {
            return Ok(out);
        }
        if pos + size > data.len() {
            return Err(ClientError::transport(-1, "truncated chunk payload"));
        }
        out.extend_from_slice(&data[pos..pos + size]);
        pos += size + 2;
    }
}

/// Decompress a gzip body, falling back to raw DEFLATE with the gzip
/// header and trailer stripped when the member is malformed.
pub fn decode_gzip(data: &[u8]) -> Result<Vec<u8>, ClientError> {
    let mut out = Vec::new();
    match GzDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(_) if data.len() > 18 => {
            out.clear();
            DeflateDecoder::new(&data[10..data.len() - 8])
                .read_to_end(&mut out)
                .map_err(|e| ClientError::transport(-1, format!("gzip decode: {e}")))?;
            Ok(out)
        }
        Err(e) => Err(ClientError::transport(-1, format!("gzip decode: {e}"))),
    }
}

/// First offset of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_chunked() {
        let body = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        assert_eq!(decode_chunked(body).unwrap(), b"Wikipedia");
    }

    #[test]
    fn test_decode_chunked_with_extension() {
        let body = b"4;name=val\r\nWiki\r\n0\r\n\r\n";
        assert_eq!(decode_chunked(body).unwrap(), b"Wiki");
    }

    #[test]
    fn test_decode_chunked_truncated() {
        assert!(decode_chunked(b"ff\r\nshort\r\n").is_err());
        assert!(decode_chunked(b"nonsense").is_err());
    }

    #[test]
    fn test_decode_chunked_cut_after_payload() {
        // Connection dropped right after a chunk payload, before (or
        // inside) its trailing CRLF.
        assert!(decode_chunked(b"4\r\nWiki").is_err());
        assert!(decode_chunked(b"4\r\nWiki\r").is_err());
        assert!(decode_chunked(b"4\r\nWiki\r\n").is_err());
    }

    #[test]
    fn test_decode_gzip() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello gzip").unwrap();
        let compressed = enc.finish().unwrap();
        assert_eq!(decode_gzip(&compressed).unwrap(), b"hello gzip");
    }

    #[test]
    fn test_decode_gzip_garbage() {
        assert!(decode_gzip(b"nope").is_err());
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"head\r\n\r\nbody", b"\r\n\r\n"), Some(4));
        assert_eq!(find(b"abc", b"xyz"), None);
    }
}
