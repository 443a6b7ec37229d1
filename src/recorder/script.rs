//! Scripted recordings
//!
//! A script is newline-delimited JSON, one command per line, each stamped
//! with the milliseconds at which it arrived:
//!
//! ```text
//! {"at": 0, "signal": "start_recording", "trial_name": "Trial 1"}
//! {"at": 1200, "signal": "look_stop"}
//! {"at": 1500, "signal": "end_recording"}
//! ```
//!
//! Replaying drives a [`Recorder`] on a [`ManualClock`], so a script yields
//! exactly the trials a live session with the same timing would.

use serde::Deserialize;

use crate::error::RecorderError;
use crate::recorder::clock::ManualClock;
use crate::recorder::cue::CuePlayer;
use crate::recorder::driver::{Command, Recorder};
use crate::types::{Millis, Trial};

/// One stamped line of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEvent {
    pub at: Millis,
    pub command: Command,
}

impl ScriptEvent {
    /// Move `clock` to this event's time and hand the command to `recorder`
    pub fn apply<P: CuePlayer>(
        self,
        recorder: &mut Recorder<ManualClock, P>,
        clock: &ManualClock,
    ) -> Option<Trial> {
        clock.set(self.at);
        recorder.handle(self.command)
    }
}

#[derive(Deserialize)]
struct Stamp {
    at: Millis,
}

/// Parse an NDJSON script. Blank lines are skipped; times must not go
/// backwards.
pub fn parse_script(input: &str) -> Result<Vec<ScriptEvent>, RecorderError> {
    let mut events: Vec<ScriptEvent> = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;

        let stamp: Stamp = serde_json::from_str(line)
            .map_err(|e| RecorderError::Script(format!("line {line_no}: {e}")))?;
        let command: Command = serde_json::from_str(line)
            .map_err(|e| RecorderError::Script(format!("line {line_no}: {e}")))?;

        if let Some(previous) = events.last() {
            if stamp.at < previous.at {
                return Err(RecorderError::Script(format!(
                    "line {line_no}: time {} is earlier than the previous {}",
                    stamp.at, previous.at
                )));
            }
        }

        events.push(ScriptEvent {
            at: stamp.at,
            command,
        });
    }

    Ok(events)
}

/// Feed `events` to `recorder`, moving `clock` to each event's time first.
///
/// `clock` must be the clock the recorder was built with.
pub fn replay<P: CuePlayer>(
    recorder: &mut Recorder<ManualClock, P>,
    clock: &ManualClock,
    events: Vec<ScriptEvent>,
) -> Vec<Trial> {
    events
        .into_iter()
        .filter_map(|event| event.apply(recorder, clock))
        .collect()
}
