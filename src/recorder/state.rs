//! Recording state machine (hold-to-look topology)
//!
//! Entering a recording assumes the subject is looking: an interval opens at
//! elapsed 0. `LookStop` closes the open interval and moves to looking-away;
//! `LookStart` opens a fresh one. Ticks only refresh the elapsed time used for
//! display; interval boundaries always come from the arrival time of the
//! signal that opened or closed them.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assembler::finalize;
use crate::types::{LookingInterval, LookingState, Millis, RecordingStatus, Trial};

/// Identity of a trial, fixed when its recording starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialHeader {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl TrialHeader {
    /// Header with a fresh UUID v4
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at,
        }
    }
}

/// A trial still being recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDraft {
    pub header: TrialHeader,
    /// Closed intervals so far; the open one lives in `open_interval_start`
    pub intervals: Vec<LookingInterval>,
}

/// The single live recording session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub status: RecordingStatus,
    pub looking_state: LookingState,
    /// Monotonic clock reading when the recording started
    pub started_at_ms: Option<Millis>,
    /// Milliseconds since the recording started, as of the last signal
    pub elapsed_ms: Millis,
    pub draft: Option<TrialDraft>,
    /// Start of the interval currently being looked through, if any
    pub open_interval_start: Option<Millis>,
}

impl RecordingSession {
    /// A fresh idle session
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }

    /// Closed intervals recorded so far in this session
    pub fn intervals(&self) -> &[LookingInterval] {
        self.draft
            .as_ref()
            .map(|d| d.intervals.as_slice())
            .unwrap_or(&[])
    }

    /// Elapsed time for a signal arriving at monotonic time `at`.
    ///
    /// Never moves backwards, so a late clock reading cannot produce an
    /// interval that overlaps an earlier one.
    fn elapsed_at(&self, at: Millis) -> Millis {
        match self.started_at_ms {
            Some(start) => self.elapsed_ms.max(at.saturating_sub(start)),
            None => self.elapsed_ms,
        }
    }
}

/// Inputs to the state machine, each stamped with its arrival time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    StartRecording { trial: TrialHeader, at: Millis },
    /// `repeat` marks a key-repeat event from a held key
    LookStart { repeat: bool, at: Millis },
    LookStop { at: Millis },
    Tick { at: Millis },
    EndRecording { at: Millis },
    CancelRecording,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::StartRecording { .. } => "start_recording",
            Signal::LookStart { .. } => "look_start",
            Signal::LookStop { .. } => "look_stop",
            Signal::Tick { .. } => "tick",
            Signal::EndRecording { .. } => "end_recording",
            Signal::CancelRecording => "cancel_recording",
        }
    }
}

/// Apply one signal to a session.
///
/// Returns the next session and, for an accepted `EndRecording`, the
/// completed trial. Signals that are illegal in the current state leave the
/// session untouched.
pub fn transition(session: RecordingSession, signal: Signal) -> (RecordingSession, Option<Trial>) {
    if !session.is_recording() && !matches!(signal, Signal::StartRecording { .. }) {
        if !matches!(signal, Signal::Tick { .. }) {
            debug!("ignoring {} while idle", signal.name());
        }
        return (session, None);
    }

    match signal {
        Signal::StartRecording { trial, at } => {
            if session.is_recording() {
                debug!("ignoring start_recording for \"{}\": already recording", trial.name);
                return (session, None);
            }
            info!("recording started: \"{}\" ({})", trial.name, trial.id);
            let next = RecordingSession {
                status: RecordingStatus::Recording,
                looking_state: LookingState::Looking,
                started_at_ms: Some(at),
                elapsed_ms: 0,
                draft: Some(TrialDraft {
                    header: trial,
                    intervals: Vec::new(),
                }),
                open_interval_start: Some(0),
            };
            (next, None)
        }

        Signal::LookStart { repeat, at } => {
            if repeat || session.looking_state == LookingState::Looking {
                return (session, None);
            }
            let mut next = session;
            next.elapsed_ms = next.elapsed_at(at);
            next.looking_state = LookingState::Looking;
            next.open_interval_start = Some(next.elapsed_ms);
            (next, None)
        }

        Signal::LookStop { at } => {
            let open = match (session.looking_state, session.open_interval_start) {
                (LookingState::Looking, Some(open)) => open,
                _ => return (session, None),
            };
            let mut next = session;
            next.elapsed_ms = next.elapsed_at(at);
            let interval = LookingInterval::new(open, next.elapsed_ms.max(open));
            if let Some(draft) = next.draft.as_mut() {
                draft.intervals.push(interval);
            }
            next.looking_state = LookingState::LookingAway;
            next.open_interval_start = None;
            (next, None)
        }

        Signal::Tick { at } => {
            let mut next = session;
            next.elapsed_ms = next.elapsed_at(at);
            (next, None)
        }

        Signal::EndRecording { at } => {
            let mut last = session;
            last.elapsed_ms = last.elapsed_at(at);
            let trial = finalize(&last);
            if let Some(trial) = &trial {
                info!(
                    "recording ended: \"{}\" after {} ms with {} interval(s)",
                    trial.name,
                    trial.total_duration,
                    trial.intervals.len()
                );
            }
            (RecordingSession::idle(), trial)
        }

        Signal::CancelRecording => {
            if let Some(draft) = &session.draft {
                info!("recording cancelled: \"{}\"", draft.header.name);
            }
            (RecordingSession::idle(), None)
        }
    }
}
