//! Single-consumer session loop
//!
//! Keyboard input, scripts and the tick timer all feed one channel; the runner
//! is the only reader, so each command is handled to completion before the
//! next one is looked at.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use log::{debug, info};

use crate::error::RecorderError;
use crate::recorder::clock::Clock;
use crate::recorder::cue::CuePlayer;
use crate::recorder::driver::{Command, Recorder};
use crate::recorder::ticker::{TickHandle, TickScheduler};
use crate::types::Trial;

/// What producers may put on the runner's queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    /// Stop the loop; a recording in progress is ended and kept
    Shutdown,
}

impl From<Command> for Input {
    fn from(command: Command) -> Self {
        Input::Command(command)
    }
}

pub struct SessionRunner<C, P, T> {
    recorder: Recorder<C, P>,
    ticker: T,
    tick_interval: Duration,
    tick_handle: Option<TickHandle>,
    tx: Sender<Input>,
    rx: Receiver<Input>,
}

impl<C: Clock, P: CuePlayer, T: TickScheduler> SessionRunner<C, P, T> {
    pub fn new(recorder: Recorder<C, P>, ticker: T, tick_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            recorder,
            ticker,
            tick_interval,
            tick_handle: None,
            tx,
            rx,
        }
    }

    /// A producer handle for the queue
    pub fn sender(&self) -> Sender<Input> {
        self.tx.clone()
    }

    pub fn recorder(&self) -> &Recorder<C, P> {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder<C, P> {
        &mut self.recorder
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_handle.is_some()
    }

    /// Handle one command directly, bypassing the queue
    pub fn dispatch(&mut self, command: Command) -> Option<Trial> {
        let completed = self.recorder.handle(command);
        self.sync_ticker();
        completed
    }

    /// Process everything already queued without blocking.
    ///
    /// Stops early at a `Shutdown`; the returned flag is true in that case.
    pub fn drain(&mut self) -> (Vec<Trial>, bool) {
        let mut trials = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Input::Command(command)) => trials.extend(self.dispatch(command)),
                Ok(Input::Shutdown) => {
                    trials.extend(self.shutdown());
                    return (trials, true);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return (trials, false)
                }
            }
        }
    }

    /// Block on the queue until `Shutdown`, handing every completed trial to
    /// `on_trial`. Stops at the first error `on_trial` returns.
    pub fn run<F>(&mut self, mut on_trial: F) -> Result<(), RecorderError>
    where
        F: FnMut(Trial) -> Result<(), RecorderError>,
    {
        while let Ok(input) = self.rx.recv() {
            match input {
                Input::Command(command) => {
                    if let Some(trial) = self.dispatch(command) {
                        on_trial(trial)?;
                    }
                }
                Input::Shutdown => {
                    if let Some(trial) = self.shutdown() {
                        on_trial(trial)?;
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Option<Trial> {
        let completed = if self.recorder.is_recording() {
            info!("shutting down with a recording in progress, ending it");
            self.dispatch(Command::EndRecording)
        } else {
            None
        };
        self.stop_ticking();
        completed
    }

    fn sync_ticker(&mut self) {
        match (self.recorder.is_recording(), self.tick_handle.is_some()) {
            (true, false) => {
                let tx = self.tx.clone();
                let handle = self.ticker.schedule(
                    self.tick_interval,
                    Box::new(move || {
                        let _ = tx.send(Input::Command(Command::Tick));
                    }),
                );
                debug!("tick scheduled every {:?}", self.tick_interval);
                self.tick_handle = Some(handle);
            }
            (false, true) => self.stop_ticking(),
            _ => {}
        }
    }

    fn stop_ticking(&mut self) {
        if let Some(handle) = self.tick_handle.take() {
            handle.cancel();
            debug!("tick cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::clock::ManualClock;
    use crate::recorder::cue::SilentCues;
    use crate::recorder::ticker::ManualTicker;
    use crate::types::LookingInterval;
    use chrono::{TimeZone, Utc};

    type TestRunner = SessionRunner<ManualClock, SilentCues, ManualTicker>;

    fn runner(limit_ms: Option<u64>) -> (TestRunner, ManualClock, ManualTicker) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 12, 11, 10, 0, 0).unwrap());
        let ticker = ManualTicker::new();
        let recorder = Recorder::new(clock.clone(), SilentCues).with_time_limit(limit_ms);
        let runner = SessionRunner::new(recorder, ticker.clone(), Duration::from_millis(10));
        (runner, clock, ticker)
    }

    fn start() -> Input {
        Input::Command(Command::StartRecording {
            trial_name: "Trial 1".to_string(),
        })
    }

    #[test]
    fn test_ticks_run_only_while_recording() {
        let (mut runner, clock, ticker) = runner(None);
        let tx = runner.sender();

        tx.send(start()).unwrap();
        runner.drain();
        assert!(runner.is_ticking());
        assert_eq!(ticker.active(), 1);
        assert_eq!(ticker.interval(), Some(Duration::from_millis(10)));

        clock.advance(10);
        ticker.fire();
        clock.advance(10);
        ticker.fire();
        runner.drain();
        assert_eq!(runner.recorder().elapsed_ms(), 20);

        tx.send(Command::EndRecording.into()).unwrap();
        let (trials, stopped) = runner.drain();
        assert!(!stopped);
        assert_eq!(trials.len(), 1);
        assert!(!runner.is_ticking());
        assert_eq!(ticker.active(), 0);
    }

    #[test]
    fn test_queue_preserves_signal_times() {
        let (mut runner, clock, ticker) = runner(None);
        let tx = runner.sender();

        tx.send(start()).unwrap();
        runner.drain();
        clock.advance(15);
        tx.send(Command::LookStop.into()).unwrap();
        runner.drain();
        clock.advance(5);
        ticker.fire();
        tx.send(Command::EndRecording.into()).unwrap();
        let (trials, _) = runner.drain();

        assert_eq!(trials[0].intervals, vec![LookingInterval::new(0, 15)]);
        assert_eq!(trials[0].total_duration, 20);
    }

    #[test]
    fn test_time_limit_through_ticks() {
        let (mut runner, clock, ticker) = runner(Some(30));
        runner.sender().send(start()).unwrap();
        runner.drain();

        let mut trials = Vec::new();
        for _ in 0..5 {
            clock.advance(10);
            ticker.fire();
            trials.extend(runner.drain().0);
        }

        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].total_duration, 30);
        assert!(!runner.is_ticking());
    }

    #[test]
    fn test_shutdown_ends_and_keeps_recording() {
        let (mut runner, clock, _) = runner(None);
        let tx = runner.sender();

        tx.send(start()).unwrap();
        runner.drain();
        clock.advance(400);
        tx.send(Input::Shutdown).unwrap();

        let mut saved = Vec::new();
        runner
            .run(|trial| {
                saved.push(trial);
                Ok(())
            })
            .unwrap();

        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].total_duration, 400);
        assert!(!runner.is_ticking());
    }

    #[test]
    fn test_run_propagates_sink_errors() {
        let (mut runner, _, _) = runner(None);
        let tx = runner.sender();
        tx.send(start()).unwrap();
        tx.send(Command::EndRecording.into()).unwrap();

        let result = runner.run(|trial| Err(RecorderError::DuplicateTrial(trial.name)));
        assert!(matches!(result, Err(RecorderError::DuplicateTrial(name)) if name == "Trial 1"));
    }
}
