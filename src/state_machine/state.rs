//! Widget state types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Visual state of the widget.
///
/// `Opening` and `Closing` carry the token of the one timer allowed to
/// complete them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetState {
    Closed,
    Opening { token: u64 },
    Open,
    Closing { token: u64 },
}

impl WidgetState {
    pub fn phase(self) -> Phase {
        match self {
            WidgetState::Closed => Phase::Closed,
            WidgetState::Opening { .. } => Phase::Opening,
            WidgetState::Open => Phase::Open,
            WidgetState::Closing { .. } => Phase::Closing,
        }
    }
}

/// Host-facing view of [`WidgetState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Whether a chat request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLifecycle {
    #[default]
    Idle,
    InFlight,
}

/// Everything the transition function needs to know about the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetModel {
    pub widget: WidgetState,
    pub request: RequestLifecycle,
    /// Token handed to the next timed transition
    pub next_token: u64,
}

impl Default for WidgetModel {
    fn default() -> Self {
        Self {
            widget: WidgetState::Closed,
            request: RequestLifecycle::Idle,
            next_token: 1,
        }
    }
}

impl WidgetModel {
    pub fn is_open(&self) -> bool {
        self.widget == WidgetState::Open
    }

    pub fn awaiting_reply(&self) -> bool {
        self.request == RequestLifecycle::InFlight
    }
}

/// Static parameters of a widget instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetContext {
    /// Duration of the opening and closing animations
    pub animation: Duration,
}

impl WidgetContext {
    pub fn new(animation: Duration) -> Self {
        Self { animation }
    }
}
