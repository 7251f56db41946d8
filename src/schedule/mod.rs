//! Debounce timers driven by a caller-supplied clock.
//!
//! Nothing here sleeps or spawns: the host loop passes `now_ms` to
//! [`Debouncer::schedule`] and polls [`Debouncer::take_ready`], and runs the
//! debounced action whenever either reports that it is due.

/// Quiescence window for content renders.
pub const RENDER_DELAY_MS: u64 = 100;

/// Quiescence window for editor layout.
pub const LAYOUT_DELAY_MS: u64 = 100;

/// Which end of a burst runs the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Run once the burst has been quiet for the whole window.
    Trailing,
    /// Run on the first call of a burst and swallow the rest of it.
    Leading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    delay_ms: u64,
    edge: Edge,
    /// Time of the most recent `schedule` in the current burst.
    last_call: Option<u64>,
}

impl Debouncer {
    pub const fn new(delay_ms: u64, edge: Edge) -> Self {
        Self {
            delay_ms,
            edge,
            last_call: None,
        }
    }

    pub const fn trailing(delay_ms: u64) -> Self {
        Self::new(delay_ms, Edge::Trailing)
    }

    pub const fn leading(delay_ms: u64) -> Self {
        Self::new(delay_ms, Edge::Leading)
    }

    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub const fn edge(&self) -> Edge {
        self.edge
    }

    /// Arm or re-arm the timer.
    ///
    /// Returns `true` when the caller must run the action right now, which
    /// only happens on the leading edge of a quiet period.
    pub fn schedule(&mut self, now_ms: u64) -> bool {
        let quiet = self
            .last_call
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.delay_ms);
        self.last_call = Some(now_ms);
        matches!(self.edge, Edge::Leading) && quiet
    }

    /// Whether a trailing action is due at `now_ms`.
    ///
    /// Clears the pending state before reporting, so a failing action never
    /// leaves the timer stuck. For a leading debouncer this only closes an
    /// expired window and always returns `false`.
    pub fn take_ready(&mut self, now_ms: u64) -> bool {
        let Some(last) = self.last_call else {
            return false;
        };
        if now_ms.saturating_sub(last) < self.delay_ms {
            return false;
        }
        self.last_call = None;
        matches!(self.edge, Edge::Trailing)
    }

    /// Cancel the pending timer; the caller runs the action synchronously.
    ///
    /// Returns whether a timer was pending.
    pub const fn flush_now(&mut self) -> bool {
        self.last_call.take().is_some()
    }

    pub const fn cancel(&mut self) {
        self.last_call = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.last_call.is_some()
    }

    /// When the pending timer expires.
    pub fn deadline(&self) -> Option<u64> {
        self.last_call.map(|last| last.saturating_add(self.delay_ms))
    }
}
