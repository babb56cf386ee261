//! Runtime for a live widget instance
//!
//! The host talks to the widget through a [`WidgetHandle`]: it forwards user
//! actions, subscribes to render notifications, and reads snapshots.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::WidgetRuntime;

use crate::config::{ConfigError, WidgetConfig};
use crate::consumer::ReplyConsumer;
use crate::identity::{
    DeviceFingerprint, HttpAddressLookup, IdentityError, IdentityStore, SessionId, SqliteStore,
    StoreError, TenantId,
};
use crate::state_machine::{Event, Phase, WidgetContext, WidgetModel};
use crate::transcript::{Message, SharedTranscript};
use crate::transport::{ChatTransport, HttpTransport, TransportError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("Widget runtime has stopped")]
    Stopped,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to set up transport: {0}")]
    Transport(#[from] TransportError),
}

/// Notifications sent to the rendering host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    StateChanged { phase: Phase, awaiting_reply: bool },
    /// New transcript content is ready to draw (only sent while open)
    TranscriptChanged { revision: u64, len: usize },
    ScrollToLatest,
    InputCleared,
}

/// Phase and request lifecycle as last published by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WidgetStatus {
    pub phase: Phase,
    pub awaiting_reply: bool,
}

impl From<&WidgetModel> for WidgetStatus {
    fn from(model: &WidgetModel) -> Self {
        Self {
            phase: model.widget.phase(),
            awaiting_reply: model.awaiting_reply(),
        }
    }
}

/// What the host should draw right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetSnapshot {
    pub phase: Phase,
    /// Show the typing indicator
    pub awaiting_reply: bool,
    /// Whether the input box accepts text
    pub input_enabled: bool,
    /// Messages to render; `None` unless the widget is open
    pub messages: Option<Vec<Message>>,
}

/// Host-side handle to a running widget
#[derive(Clone)]
pub struct WidgetHandle {
    event_tx: mpsc::UnboundedSender<Event>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    status_rx: watch::Receiver<WidgetStatus>,
    transcript: SharedTranscript,
    session_id: SessionId,
    tenant_id: TenantId,
    cancel: CancellationToken,
}

impl WidgetHandle {
    /// The launcher icon was tapped
    pub fn activate_icon(&self) -> Result<(), WidgetError> {
        self.dispatch(Event::IconActivated)
    }

    /// The close button was tapped
    pub fn close(&self) -> Result<(), WidgetError> {
        self.dispatch(Event::CloseActivated)
    }

    /// Submit the input box. Blank input or a submission while a reply is
    /// outstanding is silently dropped.
    pub fn submit(&self, text: impl Into<String>) -> Result<(), WidgetError> {
        self.dispatch(Event::Submit { text: text.into() })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn status(&self) -> WidgetStatus {
        *self.status_rx.borrow()
    }

    /// Wait until the runtime publishes a status change
    pub async fn status_changed(&mut self) -> Result<WidgetStatus, WidgetError> {
        self.status_rx
            .changed()
            .await
            .map_err(|_| WidgetError::Stopped)?;
        Ok(*self.status_rx.borrow_and_update())
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        let status = self.status();
        let open = status.phase == Phase::Open;
        WidgetSnapshot {
            phase: status.phase,
            awaiting_reply: status.awaiting_reply,
            input_enabled: open && !status.awaiting_reply,
            messages: open.then(|| self.transcript.snapshot().messages().to_vec()),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Stop the runtime. Replies already streaming run to completion but are
    /// no longer reported.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn dispatch(&self, event: Event) -> Result<(), WidgetError> {
        if self.cancel.is_cancelled() {
            return Err(WidgetError::Stopped);
        }
        self.event_tx.send(event).map_err(|_| WidgetError::Stopped)
    }
}

/// Receive the next notification, skipping any the subscriber missed.
///
/// Returns `None` once the runtime's sender is gone. Notifications describe
/// current state, so a subscriber that falls behind only draws fewer frames.
pub async fn next_event(events: &mut broadcast::Receiver<WidgetEvent>) -> Option<WidgetEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Subscriber fell behind on widget notifications");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Start a runtime on the current tokio runtime with an explicit transport
/// and already-resolved identity.
pub fn spawn<T>(
    context: WidgetContext,
    session_id: SessionId,
    tenant_id: TenantId,
    consumer: ReplyConsumer<T>,
) -> WidgetHandle
where
    T: ChatTransport + 'static,
{
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
    let (status_tx, status_rx) = watch::channel(WidgetStatus::from(&WidgetModel::default()));
    let cancel = CancellationToken::new();
    let transcript = consumer.transcript().clone();

    let runtime = WidgetRuntime::new(
        context,
        session_id.clone(),
        tenant_id.clone(),
        consumer,
        event_rx,
        event_tx.clone(),
        broadcast_tx.clone(),
        status_tx,
        cancel.clone(),
    );
    tokio::spawn(runtime.run());

    WidgetHandle {
        event_tx,
        broadcast_tx,
        status_rx,
        transcript,
        session_id,
        tenant_id,
        cancel,
    }
}

/// Build a production widget from configuration: resolve the visitor's
/// identity, derive the tenant, and start the runtime over HTTP.
///
/// The identity store is opened at `config.store_path`, so the same visitor
/// gets the same session id across restarts.
pub async fn launch(config: &WidgetConfig) -> Result<WidgetHandle, WidgetError> {
    config.validate()?;

    let path = &config.store_path;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StoreError::from)?;
        }
    }
    tracing::info!(path = %path.display(), "Opening identity store");
    let store = SqliteStore::open(path)?;

    let lookup = HttpAddressLookup::new(reqwest::Client::new(), config.ip_lookup_url.clone());
    let identity = IdentityStore::new(store, lookup, DeviceFingerprint::current());
    let session_id = identity.get_or_create_session_id().await?;
    let tenant_id = TenantId::from_host(&config.host);

    let transport = HttpTransport::new(config.chat_url(), config.streaming)?;
    let consumer = ReplyConsumer::new(Arc::new(transport), SharedTranscript::new(), config.coalesce)
        .with_idle_timeout(config.stream_idle_timeout);

    tracing::info!(
        tenant = %tenant_id,
        url = %config.chat_url(),
        streaming = config.streaming,
        "Widget ready"
    );
    Ok(spawn(
        WidgetContext::new(config.animation),
        session_id,
        tenant_id,
        consumer,
    ))
}
