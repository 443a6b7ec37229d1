//! Recorder configuration
//!
//! Settings persist as a small JSON file; command-line flags override them.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RecorderError;
use crate::recorder::{DEFAULT_TICK_INTERVAL_MS, DEFAULT_TIME_LIMIT_MS};
use crate::types::Millis;

/// Default directory for stored subjects
pub const DEFAULT_DATA_DIR: &str = ".looktime";

/// Default config file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Shortest tick period a recorder will run with
pub const MIN_TICK_INTERVAL_MS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Trials end automatically at this elapsed time; `None` disables
    pub time_limit_ms: Option<Millis>,
    /// Display refresh period
    pub tick_interval_ms: u64,
    /// Silence look/away cues
    pub muted: bool,
    /// Where the subject list is stored
    pub data_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: Some(DEFAULT_TIME_LIMIT_MS),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            muted: false,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl RecorderConfig {
    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, RecorderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from `path`, falling back to defaults when the file is missing
    pub fn load(path: &Path) -> Result<Self, RecorderError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), RecorderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Tick period, never shorter than [`MIN_TICK_INTERVAL_MS`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(MIN_TICK_INTERVAL_MS))
    }

    /// Set the time limit from user input in whole seconds
    pub fn set_time_limit_seconds(&mut self, input: &str) -> Result<(), RecorderError> {
        self.time_limit_ms = Some(parse_time_limit_seconds(input)?);
        Ok(())
    }
}

/// Parse a positive number of seconds into milliseconds
pub fn parse_time_limit_seconds(input: &str) -> Result<Millis, RecorderError> {
    let seconds: u64 = input.trim().parse().map_err(|_| {
        RecorderError::InvalidTimeLimit(format!(
            "\"{}\" is not a whole number of seconds",
            input.trim()
        ))
    })?;

    if seconds == 0 {
        return Err(RecorderError::InvalidTimeLimit(
            "enter a number of seconds greater than 0".to_string(),
        ));
    }

    seconds
        .checked_mul(1000)
        .ok_or_else(|| RecorderError::InvalidTimeLimit(format!("{seconds} seconds is too long")))
}
