//! reqwest-backed transport

use super::{ChatRequest, ChatResponse, ChatTransport, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport posting JSON to the chat endpoint
pub struct HttpTransport {
    client: Client,
    url: String,
    streaming: bool,
}

impl HttpTransport {
    /// `streaming = false` reads the whole body and hands it to the fallback
    /// path, for hosts whose network stack cannot read bodies incrementally.
    pub fn new(url: impl Into<String>, streaming: bool) -> Result<Self, TransportError> {
        // No overall timeout: a reply may stream for as long as the service
        // keeps sending.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, url, streaming))
    }

    pub fn with_client(client: Client, url: impl Into<String>, streaming: bool) -> Self {
        Self {
            client,
            url: url.into(),
            streaming,
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> TransportError {
        let snippet: String = body.chars().take(200).collect();
        TransportError::status(format!("HTTP {status}: {snippet}"))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        if self.streaming {
            let body = response.bytes_stream().map(|chunk| chunk.map_err(TransportError::from));
            Ok(ChatResponse::Streaming(body.boxed()))
        } else {
            let body = response.bytes().await?;
            Ok(ChatResponse::Complete(body))
        }
    }
}
