//! Trial time limit
//!
//! Lives outside the state machine: it watches elapsed time and tells the
//! driver to end the recording, at most once per session.

use log::warn;

use crate::recorder::state::RecordingSession;
use crate::types::Millis;

/// Default trial time limit (2 minutes)
pub const DEFAULT_TIME_LIMIT_MS: Millis = 120_000;

#[derive(Debug, Clone)]
pub struct TimeLimitWatchdog {
    limit_ms: Option<Millis>,
    triggered: bool,
}

impl Default for TimeLimitWatchdog {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TIME_LIMIT_MS))
    }
}

impl TimeLimitWatchdog {
    /// `None` disables the limit
    pub fn new(limit_ms: Option<Millis>) -> Self {
        Self {
            limit_ms,
            triggered: false,
        }
    }

    pub fn limit_ms(&self) -> Option<Millis> {
        self.limit_ms
    }

    pub fn set_limit(&mut self, limit_ms: Option<Millis>) {
        self.limit_ms = limit_ms;
    }

    /// Allow the watchdog to fire again (called when a recording starts)
    pub fn rearm(&mut self) {
        self.triggered = false;
    }

    /// True exactly once per recording, the first time elapsed reaches the
    /// limit. Re-arms whenever the session is idle.
    pub fn check(&mut self, session: &RecordingSession) -> bool {
        if !session.is_recording() {
            self.triggered = false;
            return false;
        }
        if self.triggered {
            return false;
        }

        match self.limit_ms {
            Some(limit) if session.elapsed_ms >= limit => {
                warn!(
                    "trial time limit of {} ms reached at {} ms, ending recording",
                    limit, session.elapsed_ms
                );
                self.triggered = true;
                true
            }
            _ => false,
        }
    }
}
