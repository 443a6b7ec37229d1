//! Stateful recorder
//!
//! Owns the live [`RecordingSession`] and wires it to its observers: every
//! command is stamped with the clock, run through the pure transition
//! function, then shown to the cue trigger and the time-limit watchdog.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::RecorderConfig;
use crate::recorder::assembler::finalize;
use crate::recorder::clock::Clock;
use crate::recorder::cue::{CuePlayer, CueTrigger};
use crate::recorder::state::{transition, RecordingSession, Signal, TrialHeader};
use crate::recorder::watchdog::TimeLimitWatchdog;
use crate::types::{Millis, Trial};

/// Unstamped commands, as produced by a keyboard or a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Command {
    StartRecording {
        #[serde(default)]
        trial_name: String,
    },
    LookStart {
        #[serde(default)]
        repeat: bool,
    },
    LookStop,
    Tick,
    EndRecording,
    CancelRecording,
}

/// Drives a recording session from commands
pub struct Recorder<C, P> {
    clock: C,
    session: RecordingSession,
    cues: CueTrigger<P>,
    watchdog: TimeLimitWatchdog,
}

impl<C: Clock, P: CuePlayer> Recorder<C, P> {
    /// Recorder with the default time limit and audible cues
    pub fn new(clock: C, player: P) -> Self {
        Self {
            clock,
            session: RecordingSession::idle(),
            cues: CueTrigger::new(player),
            watchdog: TimeLimitWatchdog::default(),
        }
    }

    /// Recorder using the time limit and mute preference from `config`
    pub fn from_config(config: &RecorderConfig, clock: C, player: P) -> Self {
        Self {
            clock,
            session: RecordingSession::idle(),
            cues: CueTrigger::new(player).with_muted(config.muted),
            watchdog: TimeLimitWatchdog::new(config.time_limit_ms),
        }
    }

    pub fn with_time_limit(mut self, limit_ms: Option<Millis>) -> Self {
        self.watchdog.set_limit(limit_ms);
        self
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn elapsed_ms(&self) -> Millis {
        self.session.elapsed_ms
    }

    pub fn time_limit_ms(&self) -> Option<Millis> {
        self.watchdog.limit_ms()
    }

    pub fn cues(&self) -> &CueTrigger<P> {
        &self.cues
    }

    pub fn cues_mut(&mut self) -> &mut CueTrigger<P> {
        &mut self.cues
    }

    /// The trial the live session would produce if it ended now
    pub fn snapshot_trial(&self) -> Option<Trial> {
        finalize(&self.session)
    }

    /// Stamp a command with the current clock reading and apply it.
    ///
    /// Returns the completed trial when the command (or the time limit it
    /// triggered) ended the recording.
    pub fn handle(&mut self, command: Command) -> Option<Trial> {
        let at = self.clock.now_ms();
        let signal = match command {
            Command::StartRecording { trial_name } => Signal::StartRecording {
                trial: TrialHeader::new(trial_name, self.clock.wall_now()),
                at,
            },
            Command::LookStart { repeat } => Signal::LookStart { repeat, at },
            Command::LookStop => Signal::LookStop { at },
            Command::Tick => Signal::Tick { at },
            Command::EndRecording => Signal::EndRecording { at },
            Command::CancelRecording => Signal::CancelRecording,
        };
        self.apply(signal)
    }

    /// Apply an already stamped signal
    pub fn apply(&mut self, signal: Signal) -> Option<Trial> {
        let starting = matches!(signal, Signal::StartRecording { .. }) && !self.is_recording();

        let completed = self.step(signal);
        if starting && self.is_recording() {
            self.watchdog.rearm();
        }
        if completed.is_some() {
            return completed;
        }

        if self.watchdog.check(&self.session) {
            let at = self.clock.now_ms();
            return self.step(Signal::EndRecording { at });
        }
        None
    }

    fn step(&mut self, signal: Signal) -> Option<Trial> {
        let session = std::mem::take(&mut self.session);
        let (session, completed) = transition(session, signal);
        self.session = session;

        if let Some(cue) = self.cues.observe(&self.session) {
            debug!("played {:?} cue at {} ms", cue, self.session.elapsed_ms);
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::clock::ManualClock;
    use crate::recorder::cue::tests::RecordingCues;
    use crate::recorder::cue::Cue;
    use crate::timeline::TrialStats;
    use crate::types::{LookingInterval, LookingState};
    use chrono::{TimeZone, Utc};

    fn recorder() -> (Recorder<ManualClock, RecordingCues>, ManualClock, RecordingCues) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 12, 11, 10, 0, 0).unwrap());
        let cues = RecordingCues::default();
        let recorder = Recorder::new(clock.clone(), cues.clone());
        (recorder, clock, cues)
    }

    fn start(name: &str) -> Command {
        Command::StartRecording {
            trial_name: name.to_string(),
        }
    }

    #[test]
    fn test_hold_release_scenario() {
        let (mut recorder, clock, _) = recorder();

        recorder.handle(start("Trial 1"));
        recorder.handle(Command::LookStart { repeat: false });
        clock.advance(1_200);
        recorder.handle(Command::LookStop);
        clock.advance(300);
        let trial = recorder.handle(Command::EndRecording).unwrap();

        assert_eq!(trial.intervals, vec![LookingInterval::new(0, 1_200)]);
        assert_eq!(trial.total_duration, 1_500);
        let stats = TrialStats::of(&trial);
        assert!((stats.looking_percent - 80.0).abs() < 1e-9);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_trial_header_comes_from_clock() {
        let (mut recorder, clock, _) = recorder();
        clock.set(2_000);

        recorder.handle(start("Trial 7"));
        clock.advance(100);
        let trial = recorder.handle(Command::EndRecording).unwrap();

        assert_eq!(trial.name, "Trial 7");
        assert_eq!(
            trial.created_at,
            Utc.with_ymd_and_hms(2024, 12, 11, 10, 0, 2).unwrap()
        );
        assert!(uuid::Uuid::parse_str(&trial.id).is_ok());
    }

    #[test]
    fn test_cues_follow_looking_state() {
        let (mut recorder, clock, cues) = recorder();

        recorder.handle(start("Trial 1"));
        clock.advance(100);
        recorder.handle(Command::LookStop);
        recorder.handle(Command::LookStop);
        clock.advance(100);
        recorder.handle(Command::LookStart { repeat: false });
        recorder.handle(Command::LookStart { repeat: true });
        recorder.handle(Command::EndRecording);

        assert_eq!(*cues.played.borrow(), vec![Cue::Look, Cue::Away, Cue::Look]);
    }

    #[test]
    fn test_muted_recorder_plays_nothing() {
        let (mut recorder, _, cues) = recorder();
        recorder.cues_mut().set_muted(true);

        recorder.handle(start("Trial 1"));
        recorder.handle(Command::LookStop);

        assert!(cues.played.borrow().is_empty());
    }

    #[test]
    fn test_time_limit_auto_ends_once() {
        let (recorder, clock, _) = recorder();
        let mut recorder = recorder.with_time_limit(Some(1_000));

        recorder.handle(start("Trial 1"));
        clock.advance(600);
        assert!(recorder.handle(Command::Tick).is_none());
        clock.advance(410);
        let trial = recorder.handle(Command::Tick).unwrap();

        assert_eq!(trial.total_duration, 1_010);
        assert_eq!(trial.intervals, vec![LookingInterval::new(0, 1_010)]);
        assert!(!recorder.is_recording());

        clock.advance(10);
        assert!(recorder.handle(Command::Tick).is_none());
        assert!(recorder.handle(Command::EndRecording).is_none());
    }

    #[test]
    fn test_time_limit_rearms_for_next_trial() {
        let (recorder, clock, _) = recorder();
        let mut recorder = recorder.with_time_limit(Some(500));

        recorder.handle(start("Trial 1"));
        clock.advance(500);
        assert!(recorder.handle(Command::Tick).is_some());

        recorder.handle(start("Trial 2"));
        clock.advance(499);
        assert!(recorder.handle(Command::Tick).is_none());
        clock.advance(1);
        let trial = recorder.handle(Command::LookStop).unwrap();
        assert_eq!(trial.name, "Trial 2");
        assert_eq!(trial.intervals, vec![LookingInterval::new(0, 500)]);
    }

    #[test]
    fn test_snapshot_is_non_destructive() {
        let (mut recorder, clock, _) = recorder();
        recorder.handle(start("Trial 1"));
        clock.advance(250);
        recorder.handle(Command::Tick);

        let snapshot = recorder.snapshot_trial().unwrap();
        assert_eq!(snapshot.intervals, vec![LookingInterval::new(0, 250)]);
        assert!(recorder.is_recording());
        assert_eq!(recorder.session().looking_state, LookingState::Looking);
    }

    #[test]
    fn test_command_wire_format() {
        let command: Command =
            serde_json::from_str(r#"{"signal": "look_start", "repeat": true}"#).unwrap();
        assert_eq!(command, Command::LookStart { repeat: true });

        let command: Command = serde_json::from_str(r#"{"signal": "look_start"}"#).unwrap();
        assert_eq!(command, Command::LookStart { repeat: false });

        let command: Command = serde_json::from_str(r#"{"signal": "start_recording"}"#).unwrap();
        assert_eq!(
            command,
            Command::StartRecording {
                trial_name: String::new()
            }
        );
    }
}
