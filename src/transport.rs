//! Outbound requests to the assistant service

mod error;
mod http;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Body of a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "chatid")]
    pub session_id: String,
    #[serde(rename = "userid")]
    pub tenant_id: String,
}

/// Complete (non-streaming) reply body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompleteReply {
    pub reply: String,
}

impl CompleteReply {
    /// Parse a non-streaming body. A missing or non-string `reply` is a
    /// decode error.
    pub fn parse(body: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(body)
            .map_err(|e| TransportError::decode(format!("Malformed reply body: {e}")))
    }
}

pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// How the response body is delivered
pub enum ChatResponse {
    /// Body can be read incrementally
    Streaming(ByteStream),
    /// Body was read in one piece; holds the raw JSON
    Complete(Bytes),
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatResponse::Streaming(_) => f.write_str("ChatResponse::Streaming(..)"),
            ChatResponse::Complete(body) => f
                .debug_tuple("ChatResponse::Complete")
                .field(&body.len())
                .finish(),
        }
    }
}

/// Transport used to reach the assistant service
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one chat request. A non-success status is an error.
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        (**self).send(request).await
    }
}
