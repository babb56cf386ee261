//! Embeddable chat widget core
//!
//! Identity, reply streaming, and the open/close state machine of a site
//! chat widget. Rendering is left to the host, which drives a
//! [`WidgetHandle`] and draws what its snapshots and notifications describe.

pub mod config;
pub mod consumer;
pub mod identity;
pub mod runtime;
pub mod state_machine;
pub mod stream;
pub mod transcript;
pub mod transport;

pub use config::{ConfigError, WidgetConfig};
pub use consumer::{ReplyConsumer, ReplyOutcome, APOLOGY};
pub use identity::{SessionId, TenantId};
pub use runtime::{
    launch, next_event, spawn, WidgetError, WidgetEvent, WidgetHandle, WidgetSnapshot,
    WidgetStatus,
};
pub use state_machine::Phase;
pub use transcript::{Message, Origin};
