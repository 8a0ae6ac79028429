//! Debounced title editing.
//!
//! Writing a title on every keystroke costs one remote write per
//! character typed. `TitleEditor` buffers keystrokes instead: the
//! latest value is committed once a quiet period passes without further
//! input, or immediately on blur. Exactly the final value reaches the
//! store, the same persisted end state per-keystroke writes would
//! produce.
//!
//! The editor is pure bookkeeping over caller-supplied instants, so the
//! controllers decide how to wait (`tokio::time::sleep_until`) and tests
//! need no timer at all.

use std::time::{Duration, Instant};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(400);

#[derive(Debug)]
pub struct TitleEditor {
    pending: Option<String>,
    deadline: Option<Instant>,
    quiet: Duration,
}

impl Default for TitleEditor {
    fn default() -> Self {
        TitleEditor::new(DEFAULT_QUIET_PERIOD)
    }
}

impl TitleEditor {
    pub fn new(quiet: Duration) -> Self {
        TitleEditor {
            pending: None,
            deadline: None,
            quiet,
        }
    }

    /// Record a keystroke's resulting value. Restarts the quiet period.
    pub fn input(&mut self, text: impl Into<String>, now: Instant) {
        self.pending = Some(text.into());
        self.deadline = Some(now + self.quiet);
    }

    /// When the pending value should be committed, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the pending value if its quiet period has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Blur: take the pending value immediately, due or not.
    pub fn commit(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        self.deadline = None;
        self.pending.take()
    }
}
