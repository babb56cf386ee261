//! Reply consumption
//!
//! Sends one chat request and writes the reply into the tail of the
//! transcript: incrementally for streamed bodies, in one step for complete
//! JSON bodies, and as a fixed apology when anything goes wrong.

use crate::identity::{SessionId, TenantId};
use crate::stream::{decode_text, CoalescePolicy, Coalescer};
use crate::transcript::SharedTranscript;
use crate::transport::{
    ByteStream, ChatRequest, ChatResponse, ChatTransport, CompleteReply, TransportError,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Shown in place of the reply when the request fails
pub const APOLOGY: &str = "Something went wrong on our side. We’re looking into it, and things should be back to normal soon. Thanks for your patience.";

/// How a reply ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Streamed body consumed to the end
    Streamed { flushes: usize },
    /// Complete JSON body applied in one step
    Complete,
    /// The apology replaced the reply
    Failed(TransportError),
}

/// Writes assistant replies into a transcript
pub struct ReplyConsumer<T: ChatTransport> {
    transport: Arc<T>,
    transcript: SharedTranscript,
    policy: CoalescePolicy,
    idle_timeout: Option<Duration>,
}

impl<T: ChatTransport> ReplyConsumer<T> {
    pub fn new(transport: Arc<T>, transcript: SharedTranscript, policy: CoalescePolicy) -> Self {
        Self {
            transport,
            transcript,
            policy,
            idle_timeout: None,
        }
    }

    /// Fail a stream that goes quiet for longer than `timeout`
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn transcript(&self) -> &SharedTranscript {
        &self.transcript
    }

    /// Append the user message and the empty assistant placeholder that the
    /// reply will fill.
    pub fn begin(&self, user_text: &str) {
        let mut transcript = self.transcript.lock();
        transcript.push_user(user_text);
        transcript.push_placeholder();
    }

    /// Append, request, and consume the reply. Callers are responsible for
    /// not running two of these at once.
    pub async fn send(
        &self,
        user_text: &str,
        session_id: &SessionId,
        tenant_id: &TenantId,
        on_update: &(dyn Fn() + Send + Sync),
    ) -> ReplyOutcome {
        self.begin(user_text);
        on_update();
        let request = ChatRequest {
            message: user_text.to_string(),
            session_id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
        };
        self.fetch(request, on_update).await
    }

    /// Request a reply for a turn already started with [`Self::begin`].
    ///
    /// `on_update` is called after every visible change to the transcript.
    pub async fn fetch(
        &self,
        request: ChatRequest,
        on_update: &(dyn Fn() + Send + Sync),
    ) -> ReplyOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("chat_request", %request_id);

        async {
            let started = Instant::now();
            tracing::info!(chars = request.message.chars().count(), "Sending chat request");

            let result = match self.transport.send(&request).await {
                Ok(ChatResponse::Streaming(body)) => self.consume_stream(body, on_update).await,
                Ok(ChatResponse::Complete(body)) => self.apply_complete(&body, on_update),
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    tracing::info!(
                        duration_ms = %started.elapsed().as_millis(),
                        outcome = ?outcome,
                        "Chat reply completed"
                    );
                    outcome
                }
                Err(e) => {
                    tracing::error!(
                        duration_ms = %started.elapsed().as_millis(),
                        error = %e,
                        kind = ?e.kind,
                        "Chat request failed"
                    );
                    self.show(APOLOGY);
                    on_update();
                    ReplyOutcome::Failed(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn consume_stream(
        &self,
        body: ByteStream,
        on_update: &(dyn Fn() + Send + Sync),
    ) -> Result<ReplyOutcome, TransportError> {
        let mut text = std::pin::pin!(decode_text(body));
        let mut coalescer = Coalescer::new(self.policy, Instant::now());
        let mut flushes = 0;

        loop {
            let next = match self.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, text.next())
                    .await
                    .unwrap_or_else(|_| {
                        Some(Err(TransportError::timeout(format!(
                            "No data for {}s",
                            limit.as_secs_f32()
                        ))))
                    }),
                None => text.next().await,
            };

            match next {
                Some(Ok(delta)) => {
                    if let Some(visible) = coalescer.push(&delta, Instant::now()) {
                        tracing::trace!(chars = visible.chars().count(), "Flushing reply text");
                        self.show(visible);
                        flushes += 1;
                        on_update();
                    }
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        if let Some(visible) = coalescer.finish(Instant::now()) {
            self.show(visible);
            flushes += 1;
            on_update();
        }
        Ok(ReplyOutcome::Streamed { flushes })
    }

    fn apply_complete(
        &self,
        body: &[u8],
        on_update: &(dyn Fn() + Send + Sync),
    ) -> Result<ReplyOutcome, TransportError> {
        let reply = CompleteReply::parse(body)?;
        self.show(&reply.reply);
        on_update();
        Ok(ReplyOutcome::Complete)
    }

    fn show(&self, text: &str) {
        if let Err(e) = self.transcript.lock().replace_tail(text) {
            tracing::error!(error = %e, "Reply placeholder missing from transcript tail");
        }
    }
}
