//! Rest timer countdown.
//!
//! The timer holds no clock. The host calls [`RestTimer::tick`] once per
//! second from whatever scheduler it owns; everything here is a pure state
//! transition.

use serde::{Deserialize, Serialize};

/// Signal emitted by a timer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestEvent {
    RestComplete,
}

/// Countdown state for one exercise context
///
/// Invariant: `remaining_seconds <= total_seconds`. Reaching zero always
/// stops the timer.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestTimer {
    remaining_seconds: u32,
    running: bool,
    total_seconds: u32,
}

impl RestTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start (or restart) the countdown from `total_seconds`
    ///
    /// A zero duration is already complete: the timer stays stopped and
    /// `RestEvent::RestComplete` is returned right away.
    pub fn start(&mut self, total_seconds: u32) -> Option<RestEvent> {
        self.total_seconds = total_seconds;
        self.remaining_seconds = total_seconds;
        self.running = total_seconds > 0;
        tracing::debug!("Rest timer started: {}s", total_seconds);
        (!self.running).then_some(RestEvent::RestComplete)
    }

    /// Advance the countdown by one second
    ///
    /// Returns `Some(RestEvent::RestComplete)` on the tick that reaches zero.
    pub fn tick(&mut self) -> Option<RestEvent> {
        if !self.running {
            return None;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.running = false;
            tracing::debug!("Rest complete");
            return Some(RestEvent::RestComplete);
        }
        None
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume a paused countdown; a finished timer stays stopped
    pub fn resume(&mut self) {
        self.running = self.remaining_seconds > 0;
    }

    /// Stop the timer and refill it
    ///
    /// Uses `total_seconds` when given, otherwise the last configured total.
    pub fn reset(&mut self, total_seconds: Option<u32>) {
        if let Some(total) = total_seconds {
            self.total_seconds = total;
        }
        self.remaining_seconds = self.total_seconds;
        self.running = false;
    }
}
