//! Audio cue port
//!
//! The recorder never synthesizes sound. It tells a [`CuePlayer`] when the
//! looking state changes during a recording; what "playing" means is up to
//! the player.

use std::io::{self, Write};

use crate::recorder::state::RecordingSession;
use crate::types::LookingState;

/// Which cue was played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Look,
    Away,
}

/// Fire-and-forget cue playback. Implementations must not block or panic
/// when playback is unavailable.
pub trait CuePlayer {
    fn play_look_cue(&self);
    fn play_away_cue(&self);
}

/// Plays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentCues;

impl CuePlayer for SilentCues {
    fn play_look_cue(&self) {}
    fn play_away_cue(&self) {}
}

/// Rings the terminal bell on stderr: once for looking, twice for away
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl TerminalBell {
    fn ring(times: usize) {
        let mut stderr = io::stderr();
        let _ = stderr.write_all("\x07".repeat(times).as_bytes());
        let _ = stderr.flush();
    }
}

impl CuePlayer for TerminalBell {
    fn play_look_cue(&self) {
        Self::ring(1);
    }

    fn play_away_cue(&self) {
        Self::ring(2);
    }
}

/// Compares consecutive session snapshots and plays a cue on each change of
/// looking state while recording.
#[derive(Debug)]
pub struct CueTrigger<P> {
    player: P,
    previous: LookingState,
    muted: bool,
}

impl<P: CuePlayer> CueTrigger<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            previous: LookingState::Neutral,
            muted: false,
        }
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Flip the mute flag and return the new value
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// Observe the latest snapshot; returns the cue actually played, if any.
    pub fn observe(&mut self, session: &RecordingSession) -> Option<Cue> {
        let current = session.looking_state;
        let changed = current != self.previous;
        self.previous = current;

        if !session.is_recording() || !changed || self.muted {
            return None;
        }

        match current {
            LookingState::Looking => {
                self.player.play_look_cue();
                Some(Cue::Look)
            }
            LookingState::LookingAway => {
                self.player.play_away_cue();
                Some(Cue::Away)
            }
            LookingState::Neutral => None,
        }
    }
}
