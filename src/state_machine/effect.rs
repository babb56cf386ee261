//! Effects produced by state transitions

use std::time::Duration;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver `TransitionElapsed { token }` after `delay`
    ScheduleTransition { token: u64, delay: Duration },

    /// Append the user message and placeholder, then request a reply
    SendMessage { text: String },

    /// Empty the host's input field
    ClearInput,

    /// Tell the host the phase or request lifecycle changed
    NotifyStateChange,

    /// Tell the host the transcript has new content to render
    RefreshTranscript,

    /// Scroll the message list to the newest entry
    ScrollToLatest,
}

impl Effect {
    pub fn schedule(token: u64, delay: Duration) -> Self {
        Effect::ScheduleTransition { token, delay }
    }

    pub fn send_message(text: impl Into<String>) -> Self {
        Effect::SendMessage { text: text.into() }
    }
}
