//! Events that can occur in a widget

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    IconActivated,
    CloseActivated,
    Submit { text: String },

    // Timer events
    TransitionElapsed { token: u64 },

    // Reply events
    TranscriptChanged,
    ResponseFinished,
}
