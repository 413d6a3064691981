use easyreq::client::options::FollowRedirects;
use easyreq::client::Client;
use easyreq::{CookieJar, FileCookieJar, JarHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_cookies_carried_across_redirect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = "HTTP/1.1 302 Found\r\nSet-Cookie: sid=abc123\r\nSet-Cookie: theme=dark; Path=/\r\nLocation: /next\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
        }
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            let response = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    let mut client = Client::get(&format!("http://{}/", addr))
        .unwrap()
        .with_follow_redirects(FollowRedirects::Unlimited);
    client.send().await.unwrap();

    let second = rx.await.unwrap();
    assert!(second.contains("Cookie: sid=abc123; theme=dark;\r\n"));

    // The jar keeps them after the exchange too.
    let jar = client.cookie_jar().unwrap();
    assert_eq!(jar.jar().iter().count(), 2);
}

#[tokio::test]
async fn test_explicit_cookie_header_seeds_jar_and_goes_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            let response = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    let mut client = Client::get(&format!("http://{}/", addr))
        .unwrap()
        .with_header("Cookie", "pre=set");
    client.send().await.unwrap();

    let request = rx.await.unwrap();
    assert!(request.contains("Cookie: pre=set;\r\n"));
    assert_eq!(client.cookie_jar().unwrap().jar().iter().count(), 1);
}

#[tokio::test]
async fn test_shared_jar_sends_existing_cookies() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
            let response = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    let mut jar = CookieJar::new();
    jar.from_string("session=xyz", "127.0.0.1", "/");

    let mut client = Client::get(&format!("http://{}/page", addr))
        .unwrap()
        .with_cookie_jar(JarHandle::Memory(jar));
    client.send().await.unwrap();

    let request = rx.await.unwrap();
    assert!(request.contains("Cookie: session=xyz;\r\n"));
}

#[tokio::test]
async fn test_file_jar_persists_received_cookies() {
    let dir = tempfile::tempdir().unwrap();
    let jar_path = dir.path().join("cookies.json");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = "HTTP/1.1 200 OK\r\nSet-Cookie: keep=me; Max-Age=3600\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    {
        let jar = FileCookieJar::open(&jar_path).unwrap();
        let mut client = Client::get(&format!("http://{}/", addr))
            .unwrap()
            .with_cookie_jar(JarHandle::File(jar));
        client.send().await.unwrap();
        // Dropping the client drops the jar, which flushes to disk.
    }

    let mut reloaded = FileCookieJar::open(&jar_path).unwrap();
    assert_eq!(
        reloaded.jar_mut().header_for("127.0.0.1", "/", false),
        "keep=me;"
    );
}
