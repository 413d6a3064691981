use easyreq::client::Client;
use easyreq::{ClientError, HandlerChoice};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const OK_RESPONSE: &str =
    "HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\nproxied";

fn socket_handler() -> HandlerChoice {
    HandlerChoice::Named("socket".to_string())
}

#[tokio::test]
async fn test_http_proxy_gets_absolute_uri() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            let _ = socket.write_all(OK_RESPONSE.as_bytes()).await;
        }
    });

    let mut client = Client::get("http://target.test/page?x=1")
        .unwrap()
        .with_handler(socket_handler())
        .with_http_proxy(&addr.to_string(), Some("u:p"))
        .unwrap();
    client.send().await.unwrap();

    let request = rx.await.unwrap();
    assert!(request.starts_with("GET http://target.test/page?x=1 HTTP/1.1\r\n"));
    assert!(request.contains("Proxy-Authorization: Basic dTpw\r\n"));
    assert!(request.contains("Host: target.test\r\n"));
    assert!(request.contains("Connection: close\r\n"));
    assert_eq!(client.response().unwrap().status(), 200);
}

#[tokio::test]
async fn test_socks5_no_auth_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            // Greeting offers exactly one method: no-auth.
            let mut greeting = [0u8; 3];
            socket.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [5, 1, 0]);
            socket.write_all(&[5, 0]).await.unwrap();

            // Straight to CONNECT, no credentials on the wire.
            let mut head = [0u8; 5];
            socket.read_exact(&mut head).await.unwrap();
            assert_eq!(head[..4], [5, 1, 0, 3]);
            let mut rest = vec![0u8; head[4] as usize + 2];
            socket.read_exact(&mut rest).await.unwrap();
            let host = String::from_utf8_lossy(&rest[..head[4] as usize]).into_owned();
            let port = u16::from_be_bytes([rest[rest.len() - 2], rest[rest.len() - 1]]);
            assert_eq!(host, "target.test");
            assert_eq!(port, 8080);
            socket.write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();

            // Now act as the origin inside the tunnel.
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(OK_RESPONSE.as_bytes()).await;
        }
    });

    let mut client = Client::get("http://target.test:8080/path")
        .unwrap()
        .with_handler(socket_handler())
        .with_socks5_proxy(&addr.to_string(), None)
        .unwrap();
    let status = client.send().await.unwrap().unwrap().status();
    assert_eq!(status, 200);
    assert!(client.error().is_none());
}

#[tokio::test]
async fn test_socks5_userpass_subnegotiation() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut greeting = [0u8; 3];
            socket.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [5, 1, 2]);
            socket.write_all(&[5, 2]).await.unwrap();

            // RFC1929: version, ulen, user, plen, pass.
            let mut head = [0u8; 2];
            socket.read_exact(&mut head).await.unwrap();
            assert_eq!(head[0], 1);
            let mut user = vec![0u8; head[1] as usize];
            socket.read_exact(&mut user).await.unwrap();
            let mut plen = [0u8; 1];
            socket.read_exact(&mut plen).await.unwrap();
            let mut pass = vec![0u8; plen[0] as usize];
            socket.read_exact(&mut pass).await.unwrap();
            assert_eq!(user, b"user");
            assert_eq!(pass, b"secret");
            // Success status is 0x00.
            socket.write_all(&[1, 0]).await.unwrap();

            let mut head = [0u8; 5];
            socket.read_exact(&mut head).await.unwrap();
            let mut rest = vec![0u8; head[4] as usize + 2];
            socket.read_exact(&mut rest).await.unwrap();
            socket.write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0]).await.unwrap();

            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(OK_RESPONSE.as_bytes()).await;
        }
    });

    let mut client = Client::get("http://target.test/")
        .unwrap()
        .with_handler(socket_handler())
        .with_socks5_proxy(&addr.to_string(), Some("user:secret"))
        .unwrap();
    let status = client.send().await.unwrap().unwrap().status();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_socks4a_sends_hostname() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut head = [0u8; 8];
            socket.read_exact(&mut head).await.unwrap();
            assert_eq!(head[0], 4);
            assert_eq!(head[1], 1);
            assert_eq!(u16::from_be_bytes([head[2], head[3]]), 80);
            // The 4A marker address 0.0.0.1.
            assert_eq!(head[4..8], [0, 0, 0, 1]);

            // Null user field, then the hostname, null-terminated.
            let mut trailer = Vec::new();
            let mut byte = [0u8; 1];
            let mut nulls = 0;
            while nulls < 2 {
                socket.read_exact(&mut byte).await.unwrap();
                if byte[0] == 0 {
                    nulls += 1;
                } else {
                    trailer.push(byte[0]);
                }
            }
            assert_eq!(trailer, b"target.test");

            socket.write_all(&[0, 90, 0, 0, 0, 0, 0, 0]).await.unwrap();

            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(OK_RESPONSE.as_bytes()).await;
        }
    });

    let mut client = Client::get("http://target.test/")
        .unwrap()
        .with_handler(socket_handler())
        .with_socks4_proxy(&addr.to_string())
        .unwrap();
    let status = client.send().await.unwrap().unwrap().status();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_socks4_rejection_is_stored_not_thrown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
            // 91: request rejected or failed.
            let _ = socket.write_all(&[0, 91, 0, 0, 0, 0, 0, 0]).await;
        }
    });

    let mut client = Client::get("http://target.test/")
        .unwrap()
        .with_handler(socket_handler())
        .with_socks4_proxy(&addr.to_string())
        .unwrap();
    let result = client.send().await.unwrap();
    assert!(result.is_none());
    assert!(matches!(
        client.error(),
        Some(ClientError::Transport { code: 91, .. })
    ));
}
