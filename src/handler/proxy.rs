//! Proxy configuration and SOCKS tunnel negotiation.

use std::net::Ipv4Addr;

use base64::{engine::general_purpose, Engine as _};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use zeroize::Zeroizing;

use crate::base::error::ClientError;

/// Proxy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    /// Plain HTTP proxy (absolute-URI request line, CONNECT for tunnels).
    Http,
    Socks4,
    Socks4a,
    Socks5,
}

/// A proxy endpoint with optional credentials.
#[derive(Debug, Clone)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    /// `None` until the engine defaults it to HTTP at compile time.
    pub proxy_type: Option<ProxyType>,
    pub username: Option<String>,
    /// Zeroized on drop.
    pub password: Option<Zeroizing<String>>,
}

impl Proxy {
    /// Parse a `host:port` proxy address.
    pub fn new(address: &str) -> Result<Self, ClientError> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| ClientError::invalid_option("proxy", "expected host:port"))?;
        if host.is_empty() {
            return Err(ClientError::invalid_option("proxy", "empty host"));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ClientError::invalid_option("proxy", format!("bad port in {address:?}")))?;
        Ok(Self {
            host: host.to_string(),
            port,
            proxy_type: None,
            username: None,
            password: None,
        })
    }

    pub fn with_type(mut self, proxy_type: ProxyType) -> Self {
        self.proxy_type = Some(proxy_type);
        self
    }

    /// Set credentials from a `user:pass` string.
    pub fn with_userpwd(mut self, userpwd: &str) -> Result<Self, ClientError> {
        let (user, pass) = userpwd
            .split_once(':')
            .ok_or_else(|| ClientError::invalid_option("proxy_userpwd", "expected user:pass"))?;
        self.username = Some(user.to_string());
        self.password = Some(Zeroizing::new(pass.to_string()));
        Ok(self)
    }

    pub fn effective_type(&self) -> ProxyType {
        self.proxy_type.unwrap_or(ProxyType::Http)
    }

    pub fn is_socks(&self) -> bool {
        matches!(
            self.effective_type(),
            ProxyType::Socks4 | ProxyType::Socks4a | ProxyType::Socks5
        )
    }

    pub fn requires_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// `Proxy-Authorization` value for HTTP proxies.
    pub fn auth_header(&self) -> Option<String> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            let creds = format!("{}:{}", u, p.as_str());
            Some(format!("Basic {}", general_purpose::STANDARD.encode(creds)))
        } else {
            None
        }
    }

    /// Negotiate a SOCKS tunnel to `host:port` over an established
    /// connection to the proxy. SOCKS4 with credentials falls back to
    /// SOCKS5, since SOCKS4 has no authentication step.
    pub async fn socks_tunnel<S>(
        &self,
        stream: &mut S,
        host: &str,
        port: u16,
    ) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut kind = self.effective_type();
        if matches!(kind, ProxyType::Socks4 | ProxyType::Socks4a) && self.requires_auth() {
            debug!(proxy = %self.host, "socks4 with credentials, using socks5");
            kind = ProxyType::Socks5;
        }
        match kind {
            ProxyType::Socks4 | ProxyType::Socks4a => self.socks4(stream, host, port).await,
            ProxyType::Socks5 => self.socks5(stream, host, port).await,
            ProxyType::Http => Ok(()),
        }
    }

    /// SOCKS4 CONNECT; non-IPv4 targets use the 4A extension, sending
    /// `0.0.0.1` as the address and the hostname after the user field.
    async fn socks4<S>(&self, stream: &mut S, host: &str, port: u16) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut req = vec![4u8, 1];
        req.extend_from_slice(&port.to_be_bytes());
        match host.parse::<Ipv4Addr>() {
            Ok(ip) => {
                req.extend_from_slice(&ip.octets());
                req.push(0);
            }
            Err(_) => {
                req.extend_from_slice(&[0, 0, 0, 1]);
                req.push(0);
                req.extend_from_slice(host.as_bytes());
                req.push(0);
            }
        }
        stream
            .write_all(&req)
            .await
            .map_err(|e| ClientError::io("socks4 request", &e))?;

        let mut reply = [0u8; 8];
        stream
            .read_exact(&mut reply)
            .await
            .map_err(|e| ClientError::io("socks4 reply", &e))?;
        if reply[1] != 90 {
            return Err(ClientError::transport(
                reply[1] as i32,
                format!("socks4 connect rejected with code {}", reply[1]),
            ));
        }
        Ok(())
    }

    /// SOCKS5 method negotiation, optional RFC1929 username/password
    /// sub-negotiation, then CONNECT with a domain address type.
    async fn socks5<S>(&self, stream: &mut S, host: &str, port: u16) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let method: u8 = if self.requires_auth() { 2 } else { 0 };
        stream
            .write_all(&[5, 1, method])
            .await
            .map_err(|e| ClientError::io("socks5 greeting", &e))?;

        let mut choice = [0u8; 2];
        stream
            .read_exact(&mut choice)
            .await
            .map_err(|e| ClientError::io("socks5 method reply", &e))?;
        if choice != [5, method] {
            return Err(ClientError::transport(
                choice[1] as i32,
                "socks5 proxy refused the offered auth method",
            ));
        }

        if method == 2 {
            let user = self.username.as_deref().unwrap_or("");
            let pass = self.password.as_deref().map(|p| p.as_str()).unwrap_or("");
            if user.len() > 255 || pass.len() > 255 {
                return Err(ClientError::invalid_option(
                    "proxy_userpwd",
                    "socks5 credentials limited to 255 bytes each",
                ));
            }
            let mut sub = vec![1u8, user.len() as u8];
            sub.extend_from_slice(user.as_bytes());
            sub.push(pass.len() as u8);
            sub.extend_from_slice(pass.as_bytes());
            stream
                .write_all(&sub)
                .await
                .map_err(|e| ClientError::io("socks5 auth", &e))?;

            let mut status = [0u8; 2];
            stream
                .read_exact(&mut status)
                .await
                .map_err(|e| ClientError::io("socks5 auth reply", &e))?;
            // RFC1929: any non-zero status is a failure.
            if status[1] != 0 {
                return Err(ClientError::transport(
                    status[1] as i32,
                    "socks5 authentication failed",
                ));
            }
        }

        if host.len() > 255 {
            return Err(ClientError::transport(-1, "hostname too long for socks5"));
        }
        let mut connect = vec![5u8, 1, 0, 3, host.len() as u8];
        connect.extend_from_slice(host.as_bytes());
        connect.extend_from_slice(&port.to_be_bytes());
        stream
            .write_all(&connect)
            .await
            .map_err(|e| ClientError::io("socks5 connect", &e))?;

        let mut head = [0u8; 4];
        stream
            .read_exact(&mut head)
            .await
            .map_err(|e| ClientError::io("socks5 connect reply", &e))?;
        if head[0] != 5 || head[1] != 0 {
            return Err(ClientError::transport(
                head[1] as i32,
                format!("socks5 connect rejected with code {}", head[1]),
            ));
        }

        // Drain the bound address so the stream is positioned at tunnel data.
        let addr_len = match head[3] {
            1 => 4,
            4 => 16,
            3 => {
                let mut len = [0u8; 1];
                stream
                    .read_exact(&mut len)
                    .await
                    .map_err(|e| ClientError::io("socks5 connect reply", &e))?;
                len[0] as usize
            }
            other => {
                return Err(ClientError::transport(
                    other as i32,
                    "socks5 reply with unknown address type",
                ))
            }
        };
        let mut rest = vec![0u8; addr_len + 2];
        stream
            .read_exact(&mut rest)
            .await
            .map_err(|e| ClientError::io("socks5 connect reply", &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let p = Proxy::new("proxy.test:1080").unwrap();
        assert_eq!(p.host, "proxy.test");
        assert_eq!(p.port, 1080);
        assert_eq!(p.effective_type(), ProxyType::Http);
    }

    #[test]
    fn test_bad_address_rejected() {
        assert!(Proxy::new("noport").is_err());
        assert!(Proxy::new(":1080").is_err());
        assert!(Proxy::new("host:badport").is_err());
    }

    #[test]
    fn test_userpwd_shape() {
        let p = Proxy::new("h:1").unwrap().with_userpwd("user:pa:ss").unwrap();
        assert_eq!(p.username.as_deref(), Some("user"));
        assert_eq!(p.password.as_deref().map(|p| p.as_str()), Some("pa:ss"));
        assert!(Proxy::new("h:1").unwrap().with_userpwd("nope").is_err());
    }

    #[test]
    fn test_auth_header() {
        let p = Proxy::new("h:1").unwrap().with_userpwd("u:p").unwrap();
        assert_eq!(p.auth_header().unwrap(), "Basic dTpw");
        assert!(Proxy::new("h:1").unwrap().auth_header().is_none());
    }
}
