//! End-to-end tests over a real TCP connection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dose::config::{AppState, Config};
use dose::server::{create_listener, run_server};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Notify;

struct Server {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    _dir: tempfile::TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

async fn start(configure: impl FnOnce(&mut Config)) -> Server {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs").join("big file.bin"), vec![7u8; 100_000]).unwrap();

    let mut config = Config::load_from("no-such-config").unwrap();
    config.files.base_dir = Some(dir.path().to_path_buf());
    config.logging.access_log = false;
    configure(&mut config);

    let state = Arc::new(AppState::new(config).unwrap());
    let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Notify::new());
    tokio::spawn(run_server(
        listener,
        state,
        Arc::clone(&shutdown),
        Duration::from_secs(1),
    ));

    Server {
        addr,
        shutdown,
        _dir: dir,
    }
}

struct RawResponse {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one response; `head_only` skips the body as for HEAD requests
async fn read_response(reader: &mut BufReader<TcpStream>, head_only: bool) -> RawResponse {
    let mut status_line = String::new();
    reader.read_line(&mut status_line).await.unwrap();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').unwrap();
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut response = RawResponse {
        status_line: status_line.trim_end().to_string(),
        headers,
        body: Vec::new(),
    };
    if !head_only {
        let len: usize = response.header("content-length").unwrap().parse().unwrap();
        response.body = vec![0; len];
        reader.read_exact(&mut response.body).await.unwrap();
    }
    response
}

async fn connect(server: &Server) -> BufReader<TcpStream> {
    BufReader::new(TcpStream::connect(server.addr).await.unwrap())
}

async fn send(reader: &mut BufReader<TcpStream>, request: &str) {
    reader.get_mut().write_all(request.as_bytes()).await.unwrap();
}

#[tokio::test]
async fn test_get_serves_file_with_headers() {
    let server = start(|_| {}).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "GET /hello.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let response = read_response(&mut conn, false).await;

    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert_eq!(response.header("content-length"), Some("11"));
    assert_eq!(response.header("connection"), Some("keep-alive"));
    assert!(response.header("etag").unwrap().starts_with("W/\""));
    assert_eq!(response.body, b"hello world");
}

#[tokio::test]
async fn test_keep_alive_reuses_connection() {
    let server = start(|_| {}).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "GET /docs/big%20file.bin HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let first = read_response(&mut conn, false).await;
    assert_eq!(first.status_line, "HTTP/1.1 200 OK");
    assert_eq!(first.body.len(), 100_000);
    assert!(first.body.iter().all(|b| *b == 7));

    send(&mut conn, "GET /nope.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let second = read_response(&mut conn, false).await;
    assert_eq!(second.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(second.body, b"Failure: 404 Not Found\r\n");
}

#[tokio::test]
async fn test_head_has_headers_but_no_body() {
    let server = start(|_| {}).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "HEAD /hello.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let response = read_response(&mut conn, true).await;
    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert_eq!(response.header("content-length"), Some("11"));

    // The next response on the same connection starts right away
    send(&mut conn, "GET /hello.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let next = read_response(&mut conn, false).await;
    assert_eq!(next.body, b"hello world");
}

#[tokio::test]
async fn test_traversal_forbidden() {
    let server = start(|_| {}).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "GET /docs/../hello.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let response = read_response(&mut conn, false).await;
    assert_eq!(response.status_line, "HTTP/1.1 403 Forbidden");
    assert_eq!(
        response.header("content-type"),
        Some("text/plain; charset=UTF-8")
    );
}

#[tokio::test]
async fn test_method_not_allowed() {
    let server = start(|_| {}).await;
    let mut conn = connect(&server).await;

    send(
        &mut conn,
        "POST /hello.txt HTTP/1.1\r\nHost: t\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    let response = read_response(&mut conn, false).await;
    assert_eq!(response.status_line, "HTTP/1.1 405 Method Not Allowed");
}

#[tokio::test]
async fn test_oversized_body_is_bad_request() {
    let server = start(|config| config.http.max_request_size = 16).await;
    let mut conn = connect(&server).await;

    send(
        &mut conn,
        "GET /hello.txt HTTP/1.1\r\nHost: t\r\nContent-Length: 32\r\n\r\n0123456789abcdef0123456789abcdef",
    )
    .await;
    let response = read_response(&mut conn, false).await;
    assert_eq!(response.status_line, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_strong_etag_and_revalidation() {
    let server = start(|config| config.etag.kind = "strong".to_string()).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "GET /hello.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let response = read_response(&mut conn, false).await;
    assert_eq!(
        response.header("etag"),
        Some("\"5EB63BBBE01EEED093CB22BB8F5ACDC3\"")
    );

    send(
        &mut conn,
        "GET /hello.txt HTTP/1.1\r\nHost: t\r\nIf-None-Match: \"5EB63BBBE01EEED093CB22BB8F5ACDC3\"\r\n\r\n",
    )
    .await;
    let revalidated = read_response(&mut conn, true).await;
    assert_eq!(revalidated.status_line, "HTTP/1.1 304 Not Modified");
}

#[tokio::test]
async fn test_http10_closes_after_response() {
    let server = start(|_| {}).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "GET /hello.txt HTTP/1.0\r\n\r\n").await;
    let response = read_response(&mut conn, false).await;
    assert_eq!(response.body, b"hello world");

    let mut rest = Vec::new();
    conn.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_server_keep_alive_disabled_closes() {
    let server = start(|config| config.performance.keep_alive = false).await;
    let mut conn = connect(&server).await;

    send(&mut conn, "GET /hello.txt HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let response = read_response(&mut conn, false).await;
    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    let connection: Vec<_> = response
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("connection"))
        .map(|(_, v)| v.as_str())
        .collect();
    assert_eq!(connection, ["close"]);
    assert_eq!(response.body, b"hello world");

    let mut rest = Vec::new();
    conn.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}
