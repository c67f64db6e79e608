//! HTTP status source backed by `reqwest`.
//!
//! - `GET {base}/tx/stream/{hash}` returns `text/event-stream` body, read chunk by chunk
//! - `GET {base}/tx/status/{hash}` returns one JSON status snapshot
//!
//! Both carry `Authorization: Bearer <token>` when a token is given.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use txwatch_core::error::WatchError;
use txwatch_core::status::{TxHash, TxStatus};
use txwatch_core::transport::{ByteStream, StatusSource};

/// Configuration for `HttpStatusSource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSourceConfig {
    /// Timeout for a whole status poll. Streams are not bounded.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Timeout for establishing a TCP/TLS connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_connect_timeout_ms() -> u64 { 10_000 }

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Stream and poll endpoints of the transaction API.
pub struct HttpStatusSource {
    base_url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpStatusSource {
    /// Create a source for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, config: HttpSourceConfig) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| WatchError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// Create with default configuration.
    pub fn default_for(base_url: impl Into<String>) -> Result<Self, WatchError> {
        Self::new(base_url, HttpSourceConfig::default())
    }

    pub fn stream_url(&self, tx_hash: &TxHash) -> String {
        format!("{}/tx/stream/{}", self.base_url, tx_hash)
    }

    pub fn status_url(&self, tx_hash: &TxHash) -> String {
        format!("{}/tx/status/{}", self.base_url, tx_hash)
    }

    async fn get(
        &self,
        url: String,
        accept: &'static str,
        auth_token: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, WatchError> {
        let mut req = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, accept);
        if let Some(token) = auth_token {
            req = req.bearer_auth(token);
        }
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WatchError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(WatchError::Status { status, body });
        }
        Ok(resp)
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn open_stream(
        &self,
        tx_hash: &TxHash,
        auth_token: Option<&str>,
    ) -> Result<ByteStream, WatchError> {
        let resp = self
            .get(self.stream_url(tx_hash), "text/event-stream", auth_token, None)
            .await?;

        if resp.content_length() == Some(0) {
            return Err(WatchError::MissingBody);
        }
        tracing::debug!(tx_hash = %tx_hash, url = %self.base_url, "event stream opened");

        Ok(resp
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| WatchError::Http(e.to_string()))
            })
            .boxed())
    }

    async fn fetch_status(
        &self,
        tx_hash: &TxHash,
        auth_token: Option<&str>,
    ) -> Result<TxStatus, WatchError> {
        let resp = self
            .get(
                self.status_url(tx_hash),
                "application/json",
                auth_token,
                Some(self.request_timeout),
            )
            .await?;

        let body = resp
            .text()
            .await
            .map_err(|e| WatchError::Http(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use txwatch_core::sse::SseParser;
    use txwatch_core::status::TxState;

    /// One-shot HTTP server: records the request head, answers with `response`.
    async fn serve_once(response: String) -> (String, Arc<Mutex<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(String::new()));
        let seen_clone = seen.clone();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            *seen_clone.lock().unwrap() = String::from_utf8_lossy(&head).into_owned();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let source = HttpStatusSource::default_for("https://api.example.com/v2/").unwrap();
        let hash = TxHash::new("abc123");
        assert_eq!(source.url(), "https://api.example.com/v2");
        assert_eq!(source.stream_url(&hash), "https://api.example.com/v2/tx/stream/abc123");
        assert_eq!(source.status_url(&hash), "https://api.example.com/v2/tx/status/abc123");
    }

    #[test]
    fn config_defaults() {
        let config: HttpSourceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn stream_sends_bearer_and_yields_body() {
        let body = "event: state\ndata: {\"state\":\"pending\"}\n\nevent: complete\ndata: {\"final_state\":\"updated\"}\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
        );
        let (base, seen) = serve_once(response).await;
        let source = HttpStatusSource::default_for(base).unwrap();

        let mut stream = source
            .open_stream(&TxHash::new("abc123"), Some("secret"))
            .await
            .unwrap();
        let mut parser = SseParser::new();
        let mut names = Vec::new();
        while let Some(chunk) = stream.next().await {
            for record in parser.push_bytes(&chunk.unwrap()) {
                names.push(record.event);
            }
        }
        assert_eq!(names, ["state", "complete"]);

        let head = seen.lock().unwrap().to_lowercase();
        assert!(head.starts_with("get /tx/stream/abc123 "));
        assert!(head.contains("authorization: bearer secret"));
        assert!(head.contains("accept: text/event-stream"));
    }

    #[tokio::test]
    async fn stream_rejects_non_success() {
        let response =
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 7\r\nConnection: close\r\n\r\nexpired".to_string();
        let (base, _) = serve_once(response).await;
        let source = HttpStatusSource::default_for(base).unwrap();

        let err = source
            .open_stream(&TxHash::new("abc123"), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WatchError::Status { status: 401, ref body } if body == "expired"));
    }

    #[tokio::test]
    async fn fetch_status_decodes_json() {
        let body = r#"{"tx_hash":"abc123","tx_type":"task_submit","state":"updated","retry_count":0,"confirmed_at":"2024-05-01T12:00:00Z"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (base, seen) = serve_once(response).await;
        let source = HttpStatusSource::default_for(base).unwrap();

        let status = source.fetch_status(&TxHash::new("abc123"), None).await.unwrap();
        assert_eq!(status.state, TxState::Updated);
        assert_eq!(status.confirmed_at.as_deref(), Some("2024-05-01T12:00:00Z"));

        let head = seen.lock().unwrap().to_lowercase();
        assert!(head.starts_with("get /tx/status/abc123 "));
        assert!(!head.contains("authorization"));
    }

    #[tokio::test]
    async fn fetch_status_rejects_garbage() {
        let response =
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello".to_string();
        let (base, _) = serve_once(response).await;
        let source = HttpStatusSource::default_for(base).unwrap();

        let err = source.fetch_status(&TxHash::new("abc123"), None).await.unwrap_err();
        assert!(matches!(err, WatchError::Deserialization(_)));
    }
}
