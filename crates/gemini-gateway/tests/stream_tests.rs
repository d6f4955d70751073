//! Streaming tests against a local HTTP server speaking SSE.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gemini_gateway::{Gateway, GatewayError, GeminiConfig, GeminiGateway, GenerateRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one request: headers, then `content-length` bytes of body.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                return;
            }
        }
    }
}

/// Serve the same raw response to every connection. Returns the base URL
/// and a connection counter.
async fn serve(response: String) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), hits)
}

fn sse_response(chunks: &[&str]) -> String {
    let body: String = chunks
        .iter()
        .map(|chunk| format!("data: {}\n\n", chunk))
        .collect();
    format!(
        "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

fn text_chunk(text: &str) -> String {
    format!(r#"{{"candidates": [{{"content": {{"parts": [{{"text": "{}"}}]}}}}]}}"#, text)
}

fn gateway(base_url: &str) -> GeminiGateway {
    let config = GeminiConfig::builder()
        .api_key("test-key")
        .api_url(base_url)
        .build();
    GeminiGateway::new(config).unwrap()
}

async fn stream_items(base_url: &str) -> Vec<Result<String, GatewayError>> {
    let request = GenerateRequest::new("Deduce something").unwrap();
    let stream = gateway(base_url).generate_stream(request).await.unwrap();
    stream.collect().await
}

/// Give a reconnecting event source time to dial again.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_fragments_arrive_in_order_then_end() {
    let first = text_chunk("Ele");
    let second = text_chunk("mentary");
    let (url, hits) = serve(sse_response(&[&first, &second])).await;

    let items = stream_items(&url).await;
    assert_eq!(items, vec![Ok("Ele".to_string()), Ok("mentary".to_string())]);

    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_is_single_error_without_reconnect() {
    let body = r#"{"error": {"code": 500, "message": "backend exploded", "status": "INTERNAL"}}"#;
    let (url, hits) = serve(json_response("500 Internal Server Error", body)).await;

    let items = stream_items(&url).await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(GatewayError::Transport(m)) if m.contains("backend exploded")));

    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_blocked_status_body_maps_like_generate() {
    let body = r#"{"error": {"code": 400, "message": "Request blocked by safety filters", "status": "INVALID_ARGUMENT"}}"#;
    let (url, _hits) = serve(json_response("400 Bad Request", body)).await;

    let items = stream_items(&url).await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(GatewayError::Blocked(_))));

    let request = GenerateRequest::new("Deduce something").unwrap();
    let err = gateway(&url).generate(request).await.unwrap_err();
    assert!(matches!(err, GatewayError::Blocked(_)));
}

#[tokio::test]
async fn test_stream_without_text_is_empty_response() {
    let empty = text_chunk("");
    let (url, hits) = serve(sse_response(&[&empty])).await;

    let items = stream_items(&url).await;
    assert_eq!(items, vec![Err(GatewayError::EmptyResponse)]);

    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_blocked_chunk_ends_stream() {
    let first = text_chunk("I shall");
    let blocked = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#.to_string();
    let (url, _hits) = serve(sse_response(&[&first, &blocked])).await;

    let items = stream_items(&url).await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], Ok("I shall".to_string()));
    assert!(matches!(&items[1], Err(GatewayError::Blocked(reason)) if reason == "SAFETY"));
}
