//! Coalescing of text increments into fewer, larger transcript updates

use std::time::{Duration, Instant};

/// Flush thresholds. Whichever is reached first triggers a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescePolicy {
    /// Minimum time between two flushes
    pub min_interval: Duration,
    /// Pending character count that forces a flush
    pub min_chars: usize,
}

impl Default for CoalescePolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(40),
            min_chars: 16,
        }
    }
}

/// Accumulates decoded text and decides when the visible text should be
/// replaced.
///
/// The clock is passed in by the caller, which keeps the policy independent
/// of any timer and lets tests drive it with synthetic instants.
#[derive(Debug)]
pub struct Coalescer {
    policy: CoalescePolicy,
    flushed: String,
    pending: String,
    pending_chars: usize,
    last_flush: Instant,
}

impl Coalescer {
    /// Start a coalescer whose interval is measured from `started_at`
    pub fn new(policy: CoalescePolicy, started_at: Instant) -> Self {
        Self {
            policy,
            flushed: String::new(),
            pending: String::new(),
            pending_chars: 0,
            last_flush: started_at,
        }
    }

    /// Add an increment. Returns the full accumulated text if this push
    /// triggered a flush.
    pub fn push(&mut self, delta: &str, now: Instant) -> Option<&str> {
        self.pending.push_str(delta);
        self.pending_chars += delta.chars().count();

        let elapsed = now.saturating_duration_since(self.last_flush);
        if elapsed >= self.policy.min_interval || self.pending_chars >= self.policy.min_chars {
            self.flush(now);
            Some(&self.flushed)
        } else {
            None
        }
    }

    /// Final flush at end of stream; ignores both thresholds.
    ///
    /// Returns `None` when nothing was pending.
    pub fn finish(&mut self, now: Instant) -> Option<&str> {
        if self.pending.is_empty() {
            return None;
        }
        self.flush(now);
        Some(&self.flushed)
    }

    /// Text that has been handed out so far
    pub fn flushed(&self) -> &str {
        &self.flushed
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn flush(&mut self, now: Instant) {
        self.flushed.push_str(&self.pending);
        self.pending.clear();
        self.pending_chars = 0;
        self.last_flush = now;
    }
}
