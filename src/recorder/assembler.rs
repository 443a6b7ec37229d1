//! Trial assembly
//!
//! Turns a recording session into a frozen [`Trial`]. The state machine's
//! `EndRecording` and any caller wanting a snapshot of the live session both
//! go through [`finalize`], so the "close the open interval" rule exists once.

use crate::recorder::state::RecordingSession;
use crate::types::{LookingInterval, LookingState, Trial};

/// Build the trial a session would produce if it ended now.
///
/// Returns `None` when the session has no trial in progress.
pub fn finalize(session: &RecordingSession) -> Option<Trial> {
    let draft = session.draft.as_ref()?;

    let mut intervals = draft.intervals.clone();
    if session.looking_state == LookingState::Looking {
        if let Some(open) = session.open_interval_start {
            intervals.push(LookingInterval::new(open, session.elapsed_ms.max(open)));
        }
    }

    Some(Trial {
        id: draft.header.id.clone(),
        name: draft.header.name.clone(),
        created_at: draft.header.created_at,
        total_duration: session.elapsed_ms,
        intervals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::state::{transition, Signal, TrialHeader};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn recording(signals: Vec<Signal>) -> RecordingSession {
        let header = TrialHeader {
            id: "trial-id".to_string(),
            name: "Trial 3".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 12, 11, 10, 0, 0).unwrap(),
        };
        let mut session = transition(
            RecordingSession::idle(),
            Signal::StartRecording { trial: header, at: 0 },
        )
        .0;
        for signal in signals {
            session = transition(session, signal).0;
        }
        session
    }

    #[test]
    fn test_idle_session_has_no_trial() {
        assert!(finalize(&RecordingSession::idle()).is_none());
    }

    #[test]
    fn test_snapshot_matches_end_recording() {
        let session = recording(vec![
            Signal::LookStop { at: 700 },
            Signal::LookStart { repeat: false, at: 1_000 },
            Signal::Tick { at: 1_600 },
        ]);

        let snapshot = finalize(&session).unwrap();
        let (_, ended) = transition(session, Signal::EndRecording { at: 1_600 });

        assert_eq!(Some(snapshot), ended);
    }

    #[test]
    fn test_snapshot_while_away_adds_nothing() {
        let session = recording(vec![Signal::LookStop { at: 250 }, Signal::Tick { at: 900 }]);

        let trial = finalize(&session).unwrap();
        assert_eq!(trial.intervals, vec![LookingInterval::new(0, 250)]);
        assert_eq!(trial.total_duration, 900);
        assert_eq!(trial.id, "trial-id");
        assert_eq!(trial.name, "Trial 3");
    }

    #[test]
    fn test_snapshot_does_not_mutate_session() {
        let session = recording(vec![Signal::Tick { at: 400 }]);
        let before = session.clone();

        let trial = finalize(&session).unwrap();
        assert_eq!(trial.intervals, vec![LookingInterval::new(0, 400)]);
        assert_eq!(session, before);
    }
}
