//! Pure state transition function
//!
//! Given the same model, context, and event it always produces the same
//! result; timers and I/O are expressed as effects.

use super::{Effect, Event, RequestLifecycle, WidgetContext, WidgetModel, WidgetState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_model: WidgetModel,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(model: WidgetModel) -> Self {
        Self {
            new_model: model,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Why an event was not applied. None of these are fatal; the runtime
/// drops the event and carries on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is still streaming")]
    Busy,
    #[error("Message is empty")]
    EmptyInput,
    #[error("Widget is not open")]
    NotOpen,
    #[error("Another transition is in progress")]
    TransitionPending,
    #[error("Timer {0} no longer matches the pending transition")]
    StaleTimer(u64),
    #[error("No reply is outstanding")]
    NotInFlight,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

pub fn transition(
    model: &WidgetModel,
    context: &WidgetContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (model.widget, event) {
        // ============================================================
        // Opening and closing
        // ============================================================
        (WidgetState::Closed, Event::IconActivated) => {
            let token = model.next_token;
            let next = WidgetModel {
                widget: WidgetState::Opening { token },
                next_token: token + 1,
                ..*model
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::schedule(token, context.animation))
                .with_effect(Effect::NotifyStateChange))
        }

        (WidgetState::Open, Event::CloseActivated) => {
            let token = model.next_token;
            let next = WidgetModel {
                widget: WidgetState::Closing { token },
                next_token: token + 1,
                ..*model
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::schedule(token, context.animation))
                .with_effect(Effect::NotifyStateChange))
        }

        // Activations while animating are debounced
        (
            WidgetState::Opening { .. } | WidgetState::Closing { .. },
            Event::IconActivated | Event::CloseActivated,
        ) => Err(TransitionError::TransitionPending),

        (WidgetState::Open, Event::IconActivated) => Err(TransitionError::InvalidTransition(
            "widget is already open".to_string(),
        )),

        (WidgetState::Closed, Event::CloseActivated) => Err(TransitionError::InvalidTransition(
            "widget is already closed".to_string(),
        )),

        (WidgetState::Opening { token }, Event::TransitionElapsed { token: elapsed })
            if token == elapsed =>
        {
            let next = WidgetModel {
                widget: WidgetState::Open,
                ..*model
            };
            Ok(TransitionResult::new(next).with_effects([
                Effect::NotifyStateChange,
                Effect::RefreshTranscript,
                Effect::ScrollToLatest,
            ]))
        }

        (WidgetState::Closing { token }, Event::TransitionElapsed { token: elapsed })
            if token == elapsed =>
        {
            let next = WidgetModel {
                widget: WidgetState::Closed,
                ..*model
            };
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyStateChange))
        }

        (_, Event::TransitionElapsed { token }) => Err(TransitionError::StaleTimer(token)),

        // ============================================================
        // Submission gating
        // ============================================================
        (WidgetState::Open, Event::Submit { text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            if model.request == RequestLifecycle::InFlight {
                return Err(TransitionError::Busy);
            }
            let next = WidgetModel {
                request: RequestLifecycle::InFlight,
                ..*model
            };
            Ok(TransitionResult::new(next).with_effects([
                Effect::send_message(text),
                Effect::ClearInput,
                Effect::NotifyStateChange,
            ]))
        }

        (_, Event::Submit { .. }) => Err(TransitionError::NotOpen),

        // ============================================================
        // Reply progress
        // ============================================================

        // The transcript keeps filling while closed; it is only drawn when open
        (WidgetState::Open, Event::TranscriptChanged) => Ok(TransitionResult::new(*model)
            .with_effects([Effect::RefreshTranscript, Effect::ScrollToLatest])),

        (_, Event::TranscriptChanged) => Ok(TransitionResult::new(*model)),

        (_, Event::ResponseFinished) => {
            if model.request != RequestLifecycle::InFlight {
                return Err(TransitionError::NotInFlight);
            }
            let next = WidgetModel {
                request: RequestLifecycle::Idle,
                ..*model
            };
            Ok(TransitionResult::new(next).with_effect(Effect::NotifyStateChange))
        }
    }
}
