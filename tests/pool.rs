//! End-to-end tests against a loopback HTTP/1.1 fixture server, covering
//! lease reuse, multi-endpoint pool growth, keep-alive expiry, a
//! (deliberately scaled down) concurrency cap, and transparent gzip/JSON
//! decoding.

use std::io::Write;
use std::sync::Arc;

use conduit::{EndpointKey, Pool, Scheme, Session};
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Reads one HTTP/1.1 request line + headers from `stream`, returning
/// `(method, path)`. `None` means the peer closed the connection before
/// sending anything, i.e. a graceful end of the keep-alive sequence.
async fn read_request_line(stream: &mut TcpStream) -> Option<(String, String)> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        if find_header_end(&raw).is_some() {
            break;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&raw);
    let first_line = text.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    Some((method, path))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Reads one full response (status line, headers, and a `Content-Length`
/// body) off a raw `conduit::Connection`, for tests that drive the wire
/// protocol directly instead of going through `Session::request`.
async fn read_one_response(connection: &conduit::Connection) -> Vec<u8> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 512];
    let header_end = loop {
        if let Some(pos) = find_header_end(&raw) {
            break pos + 4;
        }
        let n = connection.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "peer closed before a complete header block arrived");
        raw.extend_from_slice(&chunk[..n]);
    };

    let headers_text = String::from_utf8_lossy(&raw[..header_end]);
    let content_length: usize = headers_text
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0);
    let total = header_end + content_length;

    while raw.len() < total {
        let n = connection.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "peer closed before the declared body was fully sent");
        raw.extend_from_slice(&chunk[..n]);
    }
    raw
}

fn plain_response(status: &str, body: &[u8], extra_headers: &str) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{extra_headers}\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

fn route(method: &str, path: &str) -> Vec<u8> {
    let is_head = method == "HEAD";
    match path {
        "/" => plain_response("200 OK", if is_head { b"" } else { b"hello" }, ""),
        "/lol" => plain_response("404 Not Found", b"not found", ""),
        "/index.html" => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(GZIP_FIXTURE_BODY).unwrap();
            let compressed = encoder.finish().unwrap();
            plain_response("200 OK", &compressed, "Content-Encoding: gzip\r\n")
        }
        "/test.json" => plain_response(
            "200 OK",
            br#"[{"this is a json": "Body!"}]"#,
            "Content-Type: application/json\r\n",
        ),
        _ => plain_response("200 OK", b"", ""),
    }
}

const GZIP_FIXTURE_BODY: &[u8] = b"the quick brown fox jumps over the lazy dog";

/// Spawns a fixture server on an ephemeral loopback port. Each accepted
/// connection serves requests until `close_after` responses have been
/// sent, then closes the socket — simulating a server-side keep-alive
/// timeout.
async fn spawn_fixture(close_after: Option<usize>) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut served = 0;
                while let Some((method, path)) = read_request_line(&mut stream).await {
                    let response = route(&method, &path);
                    if stream.write_all(&response).await.is_err() {
                        return;
                    }
                    served += 1;
                    if close_after.is_some_and(|limit| served >= limit) {
                        return;
                    }
                }
            });
        }
    });

    addr
}

#[tokio::test]
async fn lease_reuse_on_one_endpoint() {
    let addr = spawn_fixture(None).await;
    let base = format!("http://{addr}");
    let session = Session::new(1);

    let head = session.request("HEAD", &format!("{base}/"), None).await.unwrap();
    assert_eq!(head.status_code(), 200);

    let get = session.request("GET", &format!("{base}/lol"), None).await.unwrap();
    assert_eq!(get.status_code(), 404);

    assert_eq!(session.connections().await, 1);
}

#[tokio::test]
async fn lease_reuse_holds_dial_count_at_one() {
    let addr = spawn_fixture(None).await;
    let endpoint = EndpointKey::new(Scheme::Http, addr.ip().to_string(), addr.port());
    let pool = Pool::new(endpoint, 1, None);

    let connection = pool.acquire().await.unwrap();
    connection
        .send(b"HEAD / HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();
    read_one_response(&connection).await;
    assert_eq!(connection.dial_count(), 1);
    connection.release();

    let connection = pool.acquire().await.unwrap();
    connection
        .send(b"GET /lol HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();
    let response = read_one_response(&connection).await;
    assert!(response.starts_with(b"HTTP/1.1 404"));
    assert_eq!(connection.dial_count(), 1, "reusing the leased connection must not re-dial");
    connection.release();
}

#[tokio::test]
async fn pool_grows_per_distinct_endpoint() {
    let addr_a = spawn_fixture(None).await;
    let addr_b = spawn_fixture(None).await;
    let session = Session::new(1);

    for _ in 0..5 {
        session
            .request("GET", &format!("http://{addr_a}/"), None)
            .await
            .unwrap();
        session
            .request("GET", &format!("http://{addr_a}/lol"), None)
            .await
            .unwrap();
        session
            .request("GET", &format!("http://{addr_b}/"), None)
            .await
            .unwrap();
    }

    assert_eq!(session.connections().await, 2, "one pool per distinct endpoint key");
}

#[tokio::test]
async fn keep_alive_expiry_surfaces_eof_and_recovers() {
    let addr = spawn_fixture(Some(2)).await;
    let base = format!("http://{addr}/");
    let session = Session::new(1);

    let mut successes = 0;
    let mut failures = 0;
    for _ in 0..6 {
        match session.request("GET", &base, None).await {
            Ok(response) => {
                assert_eq!(response.status_code(), 200);
                successes += 1;
            }
            Err(_) => failures += 1,
        }
    }

    assert!(successes > 0);
    assert!(failures > 0, "the server's keep-alive limit must surface at least one EOF");
    assert_eq!(session.connections().await, 2, "one stale slot plus one re-dialed slot");
}

#[tokio::test]
async fn concurrency_is_capped_at_pool_capacity() {
    let addr = spawn_fixture(None).await;
    let base = Arc::new(format!("http://{addr}/"));
    let session = Arc::new(Session::new(10));

    let mut handles = Vec::new();
    for _ in 0..200 {
        let session = session.clone();
        let base = base.clone();
        handles.push(tokio::spawn(async move {
            let response = session.request("HEAD", &base, None).await.unwrap();
            assert_eq!(response.status_code(), 200);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(session.connections().await, 10);
}

#[tokio::test]
async fn gzip_content_passes_through_decoded() {
    let addr = spawn_fixture(None).await;
    let session = Session::new(1);

    let response = session
        .request(
            "GET",
            &format!("http://{addr}/index.html"),
            Some(&[("Accept-Encoding", "gzip")]),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert!(response.header("content-encoding").is_some());
    assert_eq!(response.content(), GZIP_FIXTURE_BODY);
}

#[tokio::test]
async fn json_body_decodes() {
    let addr = spawn_fixture(None).await;
    let session = Session::new(1);

    let response = session
        .request("GET", &format!("http://{addr}/test.json"), None)
        .await
        .unwrap();

    let value = response.json().unwrap();
    assert_eq!(value[0]["this is a json"], "Body!");
}
