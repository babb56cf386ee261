//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::transport::{ChatRequest, ChatResponse, ChatTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Transport
// ============================================================================

/// Scripted reply for [`MockTransport`]
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Streamed body; `delay` is slept before every chunk
    Stream {
        chunks: Vec<Vec<u8>>,
        delay: Duration,
        fail_with: Option<String>,
    },
    /// Non-streaming JSON body
    Complete(String),
    /// The request itself fails
    Error(TransportError),
}

impl MockReply {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::byte_chunks(chunks.into_iter().map(|c| c.into().into_bytes()).collect())
    }

    pub fn byte_chunks(chunks: Vec<Vec<u8>>) -> Self {
        MockReply::Stream {
            chunks,
            delay: Duration::ZERO,
            fail_with: None,
        }
    }

    pub fn complete(body: impl Into<String>) -> Self {
        MockReply::Complete(body.into())
    }

    pub fn error(error: TransportError) -> Self {
        MockReply::Error(error)
    }

    /// Sleep before each chunk of a streamed reply
    pub fn with_delay(mut self, per_chunk: Duration) -> Self {
        if let MockReply::Stream { delay, .. } = &mut self {
            *delay = per_chunk;
        }
        self
    }

    /// Break the connection after the last chunk
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        if let MockReply::Stream { fail_with, .. } = &mut self {
            *fail_with = Some(message.into());
        }
        self
    }

    fn into_response(self) -> Result<ChatResponse, TransportError> {
        match self {
            MockReply::Stream {
                chunks,
                delay,
                fail_with,
            } => {
                let body = stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
                    .chain(stream::iter(
                        fail_with.map(|m| Err(TransportError::network(m))),
                    ))
                    .then(move |item| async move {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        item
                    });
                Ok(ChatResponse::Streaming(body.boxed()))
            }
            MockReply::Complete(body) => Ok(ChatResponse::Complete(Bytes::from(body))),
            MockReply::Error(e) => Err(e),
        }
    }
}

/// Mock transport that returns queued replies
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        reply
            .unwrap_or_else(|| MockReply::Error(TransportError::network("No mock reply queued")))
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{ReplyConsumer, APOLOGY};
    use crate::identity::{SessionId, TenantId};
    use crate::config::WidgetConfig;
    use crate::runtime::{launch, next_event, spawn, WidgetError, WidgetEvent, WidgetHandle};
    use crate::state_machine::{Phase, WidgetContext};
    use crate::stream::CoalescePolicy;
    use crate::transcript::{Message, SharedTranscript};
    use std::sync::Arc;

    const ANIMATION: Duration = Duration::from_millis(20);

    fn start(transport: Arc<MockTransport>) -> WidgetHandle {
        let consumer = ReplyConsumer::new(
            transport,
            SharedTranscript::new(),
            CoalescePolicy::default(),
        );
        spawn(
            WidgetContext::new(ANIMATION),
            SessionId::new("sid"),
            TenantId::from_host("www.acme.com"),
            consumer,
        )
    }

    async fn wait_until<F>(handle: &WidgetHandle, what: &str, cond: F)
    where
        F: Fn(&WidgetHandle) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if cond(handle) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("Timed out waiting for {what}");
    }

    async fn open(handle: &WidgetHandle) {
        handle.activate_icon().unwrap();
        wait_until(handle, "open", |h| h.status().phase == Phase::Open).await;
    }

    async fn wait_idle(handle: &WidgetHandle) {
        wait_until(handle, "reply to finish", |h| !h.status().awaiting_reply).await;
    }

    #[tokio::test]
    async fn test_rapid_taps_open_once() {
        let handle = start(Arc::new(MockTransport::new()));
        let mut events = handle.subscribe();

        for _ in 0..5 {
            handle.activate_icon().unwrap();
        }
        wait_until(&handle, "open", |h| h.status().phase == Phase::Open).await;
        // Let any extra timers fire
        tokio::time::sleep(ANIMATION * 3).await;

        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let WidgetEvent::StateChanged { phase, .. } = event {
                phases.push(phase);
            }
        }
        assert_eq!(phases, vec![Phase::Opening, Phase::Open]);
        assert_eq!(handle.status().phase, Phase::Open);
    }

    #[tokio::test]
    async fn test_messages_only_rendered_when_open() {
        let handle = start(Arc::new(MockTransport::new()));
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, Phase::Closed);
        assert!(snapshot.messages.is_none());
        assert!(!snapshot.input_enabled);

        open(&handle).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.messages, Some(vec![]));
        assert!(snapshot.input_enabled);
    }

    #[tokio::test]
    async fn test_back_to_back_submissions_send_once() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockReply::chunks(["Hi ", "there"]).with_delay(Duration::from_millis(30)));
        transport.queue(MockReply::chunks(["second reply"]));
        let handle = start(transport.clone());
        open(&handle).await;

        handle.submit("first").unwrap();
        handle.submit("second").unwrap();
        wait_until(&handle, "request in flight", |h| h.status().awaiting_reply).await;
        assert!(!handle.snapshot().input_enabled);
        wait_idle(&handle).await;

        assert_eq!(transport.recorded_requests().len(), 1);
        assert_eq!(transport.recorded_requests()[0].tenant_id, "acme");
        assert_eq!(
            handle.snapshot().messages.unwrap(),
            vec![Message::user("first"), Message::assistant("Hi there")]
        );
    }

    #[tokio::test]
    async fn test_blank_submission_is_dropped() {
        let transport = Arc::new(MockTransport::new());
        let handle = start(transport.clone());
        open(&handle).await;

        handle.submit("   ").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(transport.recorded_requests().is_empty());
        assert_eq!(handle.snapshot().messages, Some(vec![]));
    }

    #[tokio::test]
    async fn test_fallback_reply_through_runtime() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockReply::complete(r#"{"reply":"hello"}"#));
        let handle = start(transport);
        open(&handle).await;

        handle.submit("hi").unwrap();
        wait_until(&handle, "reply", |h| {
            h.snapshot()
                .messages
                .is_some_and(|m| m.last() == Some(&Message::assistant("hello")))
        })
        .await;
        wait_idle(&handle).await;
    }

    #[tokio::test]
    async fn test_failure_recovers_for_next_attempt() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockReply::error(TransportError::network("connection refused")));
        transport.queue(MockReply::chunks(["better now"]));
        let handle = start(transport.clone());
        open(&handle).await;

        handle.submit("one").unwrap();
        wait_until(&handle, "apology", |h| {
            h.snapshot()
                .messages
                .is_some_and(|m| m.last() == Some(&Message::assistant(APOLOGY)))
        })
        .await;
        wait_idle(&handle).await;

        handle.submit("two").unwrap();
        wait_until(&handle, "second reply", |h| {
            h.snapshot()
                .messages
                .is_some_and(|m| m.last() == Some(&Message::assistant("better now")))
        })
        .await;
        assert_eq!(transport.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_reply_keeps_filling_while_closed() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(
            MockReply::chunks(["still ", "streaming ", "after close"])
                .with_delay(Duration::from_millis(25)),
        );
        let handle = start(transport);
        open(&handle).await;

        handle.submit("hi").unwrap();
        handle.close().unwrap();
        wait_until(&handle, "closed", |h| h.status().phase == Phase::Closed).await;
        wait_idle(&handle).await;
        assert!(handle.snapshot().messages.is_none());

        open(&handle).await;
        assert_eq!(
            handle.snapshot().messages.unwrap(),
            vec![
                Message::user("hi"),
                Message::assistant("still streaming after close")
            ]
        );
    }

    #[tokio::test]
    async fn test_transcript_changes_scroll_while_open() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockReply::chunks(["reply"]));
        let handle = start(transport);
        open(&handle).await;
        let mut events = handle.subscribe();

        handle.submit("hi").unwrap();
        wait_until(&handle, "reply", |h| {
            h.snapshot()
                .messages
                .is_some_and(|m| m.last() == Some(&Message::assistant("reply")))
        })
        .await;
        wait_idle(&handle).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut scrolls = 0;
        let mut cleared = false;
        while let Ok(event) = events.try_recv() {
            match event {
                WidgetEvent::ScrollToLatest => scrolls += 1,
                WidgetEvent::InputCleared => cleared = true,
                _ => {}
            }
        }
        assert!(cleared);
        // Once for the appended turn, once for the reply text at least
        assert!(scrolls >= 2, "only {scrolls} scroll requests");
    }

    #[tokio::test]
    async fn test_status_changed_wakes_on_activation() {
        let mut handle = start(Arc::new(MockTransport::new()));
        handle.activate_icon().unwrap();
        let status = tokio::time::timeout(Duration::from_secs(1), handle.status_changed())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(status.phase, Phase::Closed);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let (tx, mut rx) = tokio::sync::broadcast::channel(2);
        for revision in 0..5 {
            tx.send(WidgetEvent::TranscriptChanged { revision, len: 2 })
                .unwrap();
        }

        // The three oldest were overwritten; the receiver resumes at the rest
        assert_eq!(
            next_event(&mut rx).await,
            Some(WidgetEvent::TranscriptChanged { revision: 3, len: 2 })
        );
        assert_eq!(
            next_event(&mut rx).await,
            Some(WidgetEvent::TranscriptChanged { revision: 4, len: 2 })
        );
        drop(tx);
        assert_eq!(next_event(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_long_fast_reply_does_not_end_subscription() {
        let chunks: Vec<String> = (0..100).map(|i| format!("chunk {i:03} of text. ")).collect();
        let expected = chunks.concat();
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockReply::chunks(chunks));
        let handle = start(transport);
        open(&handle).await;
        let mut events = handle.subscribe();

        handle.submit("hi").unwrap();
        wait_until(&handle, "full reply", |h| {
            h.snapshot()
                .messages
                .is_some_and(|m| m.last() == Some(&Message::assistant(expected.as_str())))
        })
        .await;
        wait_idle(&handle).await;

        // Far more notifications than the channel holds were sent without
        // anyone reading; the subscriber still gets the recent ones
        let mut received = 0;
        while let Ok(Some(_)) =
            tokio::time::timeout(Duration::from_millis(50), next_event(&mut events)).await
        {
            received += 1;
        }
        assert!(received > 0);

        handle.close().unwrap();
        let closed = tokio::time::timeout(Duration::from_secs(1), next_event(&mut events))
            .await
            .unwrap();
        assert!(closed.is_some());
    }

    fn offline_config(dir: &std::path::Path) -> WidgetConfig {
        WidgetConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ip_lookup_url: "http://127.0.0.1:9/?format=json".to_string(),
            host: "www.acme.com".to_string(),
            store_path: dir.join("nested").join("identity.db"),
            animation: ANIMATION,
            ..WidgetConfig::default()
        }
    }

    #[tokio::test]
    async fn test_launch_keeps_session_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(dir.path());

        let first = launch(&config).await.unwrap();
        let first_id = first.session_id().clone();
        first.shutdown();

        let second = launch(&config).await.unwrap();
        assert_eq!(second.session_id(), &first_id);
        assert_eq!(second.tenant_id().as_str(), "acme");
        assert!(config.store_path.exists());
        second.shutdown();
    }

    #[tokio::test]
    async fn test_launch_rejects_missing_api_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = WidgetConfig {
            api_base_url: String::new(),
            ..offline_config(dir.path())
        };
        let err = launch(&config).await.err().unwrap();
        assert!(matches!(err, WidgetError::Config(_)));
        assert!(!config.store_path.exists());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_further_actions() {
        let handle = start(Arc::new(MockTransport::new()));
        handle.shutdown();
        assert!(handle.activate_icon().is_err());
    }
}
