//! End-to-end tests of `ApiClient` over the reqwest transport against a
//! minimal HTTP/1.1 stub listening on localhost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use forensic_client::api::{ApiRequest, TransportError};
use forensic_client::{ApiClient, ApiError, CredentialStore, MemoryStore, Method, MultipartForm};

// ── Stub backend ─────────────────────────────────────────────────────────

struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// Raw text of every request received, header names lowercased.
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn last(&self) -> String {
        self.requests().pop().expect("stub received no request")
    }
}

/// Serve one connection per scripted response, then stop.
async fn spawn_stub(responses: Vec<(u16, &'static str)>) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            seen.lock().unwrap().push(raw);

            let response = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
    });

    StubServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            if head.contains("transfer-encoding: chunked") {
                if buf.ends_with(b"0\r\n\r\n") {
                    break;
                }
            } else if buf.len() >= end + 4 + content_length(&head) {
                break;
            }
        }
    }

    // Lowercase only the head so body assertions stay exact.
    match find(&buf, b"\r\n\r\n") {
        Some(end) => format!(
            "{}{}",
            String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase(),
            String::from_utf8_lossy(&buf[end..])
        ),
        None => String::from_utf8_lossy(&buf).to_ascii_lowercase(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_sent_and_body_returned() {
    let stub = spawn_stub(vec![(200, r#"[{"_id":"1","title":"Case A"}]"#)]).await;
    let store = MemoryStore::with_entry("token", "tok123");
    let client = ApiClient::new(&stub.base_url, store);

    let resp = client.get("/api/cases").await.unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!([{"_id": "1", "title": "Case A"}]));

    let raw = stub.last();
    assert!(raw.starts_with("get /api/cases http/1.1\r\n"), "{}", raw);
    assert!(raw.contains("authorization: bearer tok123\r\n"), "{}", raw);
    assert!(raw.contains("accept: application/json\r\n"), "{}", raw);
}

#[tokio::test]
async fn test_logged_out_request_has_no_auth_and_surfaces_401() {
    let stub = spawn_stub(vec![(401, r#"{"message":"No token provided"}"#)]).await;
    let client = ApiClient::new(&stub.base_url, MemoryStore::new());

    let err = client.get("/api/cases").await.unwrap_err();

    assert_eq!(err.status_code(), Some(401));
    assert_eq!(err.backend_message(), Some("No token provided"));
    assert!(!stub.last().contains("authorization:"));
}

#[tokio::test]
async fn test_token_change_between_calls_is_observed() {
    let stub = spawn_stub(vec![(200, "{}"), (200, "{}")]).await;
    let store = MemoryStore::with_entry("token", "first");
    let client = ApiClient::new(&stub.base_url, store.clone());

    client.get("/api/users").await.unwrap();
    store.set("token", "second").await.unwrap();
    client.get("/api/users").await.unwrap();

    let requests = stub.requests();
    assert!(requests[0].contains("authorization: bearer first\r\n"));
    assert!(requests[1].contains("authorization: bearer second\r\n"));
}

#[tokio::test]
async fn test_json_body_sent() {
    let stub = spawn_stub(vec![(201, r#"{"_id":"v1"}"#)]).await;
    let client = ApiClient::new(&stub.base_url, MemoryStore::new());

    let resp = client
        .post("/api/victims", &json!({"name": "Jane Doe"}))
        .await
        .unwrap();

    assert_eq!(resp.status, 201);
    let raw = stub.last();
    assert!(raw.starts_with("post /api/victims http/1.1\r\n"));
    assert!(raw.contains("content-type: application/json\r\n"));
    assert!(raw.ends_with(r#"{"name":"Jane Doe"}"#), "{}", raw);
}

#[tokio::test]
async fn test_multipart_upload_sent_with_boundary() {
    let stub = spawn_stub(vec![(201, r#"{"_id":"ev1"}"#)]).await;
    let client = ApiClient::new(&stub.base_url, MemoryStore::with_entry("token", "tok"));

    let form = MultipartForm::new()
        .text("caseId", "1")
        .file("files", "scene.txt", Some("text/plain"), b"blood spatter".to_vec());
    let request = ApiRequest::new(Method::Post, "/api/evidences").body(form);

    let resp = client.send(request).await.unwrap();

    assert_eq!(resp.body, json!({"_id": "ev1"}));
    let raw = stub.last();
    assert!(raw.contains("content-type: multipart/form-data; boundary="), "{}", raw);
    assert!(raw.contains("filename=\"scene.txt\""));
    assert!(raw.contains("blood spatter"));
    assert!(raw.contains("authorization: bearer tok\r\n"));
}

#[tokio::test]
async fn test_truncated_error_body_keeps_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        // Promise 100 bytes, send a few, hang up.
        socket
            .write_all(b"HTTP/1.1 500 Err\r\nContent-Length: 100\r\n\r\n{\"message\":\"bo")
            .await
            .unwrap();
        let _ = socket.shutdown().await;
    });

    let client = ApiClient::new(&format!("http://{}", addr), MemoryStore::new());
    let err = client.get("/api/cases").await.unwrap_err();

    assert!(!err.is_transport(), "{:?}", err);
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(err.body(), Some(&json!(null)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&format!("http://{}", addr), MemoryStore::new());
    let err = client.get("/api/cases").await.unwrap_err();

    assert!(err.is_transport(), "{:?}", err);
    assert_eq!(err.status_code(), None);
    assert_eq!(err.body(), None);
}

#[tokio::test]
async fn test_per_request_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and never answer.
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let client = ApiClient::new(&format!("http://{}", addr), MemoryStore::new());
    let request =
        ApiRequest::new(Method::Get, "/api/reports").timeout(Duration::from_millis(200));
    let err = client.send(request).await.unwrap_err();

    assert!(
        matches!(err, ApiError::Transport(TransportError::Timeout)),
        "{:?}",
        err
    );
}
