//! Ordered message log displayed by the widget

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Transcript is empty")]
    Empty,
    #[error("Tail message is not an assistant message")]
    TailNotAssistant,
}

/// Append-only log whose only in-place mutation is replacing the text of an
/// assistant message at the tail.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    revision: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    /// Append the empty assistant message that a streamed reply fills in
    pub fn push_placeholder(&mut self) {
        self.push(Message::assistant(String::new()));
    }

    /// Replace the text of the tail assistant message
    pub fn replace_tail(&mut self, text: impl Into<String>) -> Result<(), TranscriptError> {
        let tail = self.messages.last_mut().ok_or(TranscriptError::Empty)?;
        if tail.origin != Origin::Assistant {
            return Err(TranscriptError::TailNotAssistant);
        }
        tail.text = text.into();
        self.revision += 1;
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tail(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Bumped on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.revision += 1;
    }
}

/// Transcript shared between the runtime and the reply consumer.
///
/// The lock is only held for the duration of a single mutation or copy, never
/// across an await point.
#[derive(Debug, Clone, Default)]
pub struct SharedTranscript {
    inner: Arc<Mutex<Transcript>>,
}

impl SharedTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, Transcript> {
        // A panic while holding the lock cannot leave a half-applied
        // mutation behind, so a poisoned lock is still usable.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Transcript {
        self.lock().clone()
    }
}
