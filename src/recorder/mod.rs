//! Recording core
//!
//! Turns key-press/hold events into a gap-free sequence of timestamped looking
//! intervals.
//!
//! Flow: Command → Recorder (clock stamp) → transition → cue trigger / time
//! limit watchdog → completed Trial

pub mod assembler;
pub mod clock;
pub mod cue;
pub mod driver;
pub mod runner;
pub mod script;
pub mod state;
pub mod ticker;
pub mod watchdog;

pub use assembler::finalize;
pub use clock::{Clock, ManualClock, SystemClock};
pub use cue::{Cue, CuePlayer, CueTrigger, SilentCues, TerminalBell};
pub use driver::{Command, Recorder};
pub use runner::{Input, SessionRunner};
pub use script::{parse_script, replay, ScriptEvent};
pub use state::{transition, RecordingSession, Signal, TrialDraft, TrialHeader};
pub use ticker::{ManualTicker, ThreadTicker, TickHandle, TickScheduler, DEFAULT_TICK_INTERVAL_MS};
pub use watchdog::{TimeLimitWatchdog, DEFAULT_TIME_LIMIT_MS};
