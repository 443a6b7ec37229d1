//! Looking Time - recorder core for infant looking-time experiments
//!
//! An observer holds a key while the subject looks at the stimulus. The
//! recorder turns those presses into a gap-free sequence of timestamped looking
//! intervals, then derives timelines and CSV exports for analysis:
//! commands → recording state machine → trial assembly → timeline / CSV.
//!
//! ## Modules
//!
//! - **recorder**: state machine, trial assembly, clock, tick scheduling,
//!   cue and time-limit observers
//! - **timeline**: segments, time-axis markers and summary statistics
//! - **encoder**: per-trial and per-subject CSV export
//! - **store**: key-value persistence of subjects and their trials

pub mod config;
pub mod encoder;
pub mod error;
pub mod format;
pub mod recorder;
pub mod store;
pub mod timeline;
pub mod types;

pub use config::RecorderConfig;
pub use encoder::{encode_subject, encode_trial, CsvExport};
pub use error::RecorderError;
pub use recorder::{finalize, transition, Command, Recorder, RecordingSession, SessionRunner, Signal};
pub use store::{keep_unsaved_trial, FileStore, KeyValueStore, MemoryStore, SubjectRepository};
pub use timeline::{Timeline, TrialStats};
pub use types::{LookingInterval, LookingState, RecordingStatus, Subject, Trial};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
