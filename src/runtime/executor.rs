//! Widget runtime executor

use super::{WidgetEvent, WidgetStatus};
use crate::consumer::ReplyConsumer;
use crate::identity::{SessionId, TenantId};
use crate::state_machine::{transition, Effect, Event, WidgetContext, WidgetModel};
use crate::transport::{ChatRequest, ChatTransport};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Owns the widget model and executes the effects of its transitions.
///
/// Events are processed one at a time; timers and reply consumption run in
/// spawned tasks that report back through the event channel.
pub struct WidgetRuntime<T>
where
    T: ChatTransport + 'static,
{
    context: WidgetContext,
    model: WidgetModel,
    session_id: SessionId,
    tenant_id: TenantId,
    consumer: Arc<ReplyConsumer<T>>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    event_tx: mpsc::UnboundedSender<Event>,
    broadcast_tx: broadcast::Sender<WidgetEvent>,
    status_tx: watch::Sender<WidgetStatus>,
    cancel: CancellationToken,
}

impl<T> WidgetRuntime<T>
where
    T: ChatTransport + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: WidgetContext,
        session_id: SessionId,
        tenant_id: TenantId,
        consumer: ReplyConsumer<T>,
        event_rx: mpsc::UnboundedReceiver<Event>,
        event_tx: mpsc::UnboundedSender<Event>,
        broadcast_tx: broadcast::Sender<WidgetEvent>,
        status_tx: watch::Sender<WidgetStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            model: WidgetModel::default(),
            session_id,
            tenant_id,
            consumer: Arc::new(consumer),
            event_rx,
            event_tx,
            broadcast_tx,
            status_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(tenant = %self.tenant_id, "Starting widget runtime");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                Some(event) = self.event_rx.recv() => self.process_event(event),
                else => break,
            }
        }

        tracing::info!(tenant = %self.tenant_id, "Widget runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let label = format!("{current_event:?}");
            let result = match transition(&self.model, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    // Rejections are expected (debounced taps, blank input,
                    // submissions while busy) and never shown to the user
                    tracing::debug!(event = %label, reason = %e, "Event ignored");
                    continue;
                }
            };

            self.model = result.new_model;
            self.status_tx.send_replace(WidgetStatus::from(&self.model));

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect) {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::ScheduleTransition { token, delay } => {
                let event_tx = self.event_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Event::TransitionElapsed { token });
                        }
                    }
                });
                None
            }

            Effect::SendMessage { text } => {
                // The user message and placeholder land before anything else
                // can touch the transcript
                self.consumer.begin(&text);
                let request = ChatRequest {
                    message: text,
                    session_id: self.session_id.to_string(),
                    tenant_id: self.tenant_id.to_string(),
                };

                let consumer = self.consumer.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let update_tx = event_tx.clone();
                    let on_update = move || {
                        let _ = update_tx.send(Event::TranscriptChanged);
                    };
                    consumer.fetch(request, &on_update).await;
                    let _ = event_tx.send(Event::ResponseFinished);
                });
                Some(Event::TranscriptChanged)
            }

            Effect::ClearInput => {
                let _ = self.broadcast_tx.send(WidgetEvent::InputCleared);
                None
            }

            Effect::NotifyStateChange => {
                let _ = self.broadcast_tx.send(WidgetEvent::StateChanged {
                    phase: self.model.widget.phase(),
                    awaiting_reply: self.model.awaiting_reply(),
                });
                None
            }

            Effect::RefreshTranscript => {
                let (revision, len) = {
                    let transcript = self.consumer.transcript().lock();
                    (transcript.revision(), transcript.len())
                };
                let _ = self
                    .broadcast_tx
                    .send(WidgetEvent::TranscriptChanged { revision, len });
                None
            }

            Effect::ScrollToLatest => {
                let _ = self.broadcast_tx.send(WidgetEvent::ScrollToLatest);
                None
            }
        }
    }
}
