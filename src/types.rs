//! Core types for the looking-time recorder
//!
//! This module defines the records that flow out of a recording session:
//! looking intervals, completed trials, and the subjects that own them.
//! All times are milliseconds relative to the start of the trial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds since trial start (or since an arbitrary monotonic origin for
/// clock readings)
pub type Millis = u64;

/// Whether a recording is in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
}

/// The machine's current belief about the observed subject's gaze
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookingState {
    /// Not yet determined (before a recording starts)
    #[default]
    Neutral,
    /// Looking at the stimulus
    Looking,
    /// Looking away from the stimulus
    LookingAway,
}

impl LookingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookingState::Neutral => "neutral",
            LookingState::Looking => "looking",
            LookingState::LookingAway => "lookingAway",
        }
    }

    /// Label shown by a recording display
    pub fn label(&self) -> &'static str {
        match self {
            LookingState::Neutral => "Waiting...",
            LookingState::Looking => "LOOKING",
            LookingState::LookingAway => "NOT LOOKING",
        }
    }
}

/// A closed time range during which the subject was looking at the stimulus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookingInterval {
    /// Milliseconds from trial start when looking began
    pub start_time: Millis,
    /// Milliseconds from trial start when looking ended (>= start_time)
    pub end_time: Millis,
}

impl LookingInterval {
    pub fn new(start_time: Millis, end_time: Millis) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// Length of the interval. Zero-length intervals are valid.
    pub fn duration(&self) -> Millis {
        self.end_time.saturating_sub(self.start_time)
    }
}

/// A completed, frozen trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Name, unique among the subject's trials (case-insensitive)
    pub name: String,
    /// When the recording was started
    pub created_at: DateTime<Utc>,
    /// Total recording duration in milliseconds
    pub total_duration: Millis,
    /// Looking intervals in the order they were recorded
    pub intervals: Vec<LookingInterval>,
}

impl Trial {
    /// Sum of all interval durations
    pub fn total_looking_time(&self) -> Millis {
        self.intervals.iter().map(LookingInterval::duration).sum()
    }
}

/// A grouping of trials belonging to one observed individual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    /// Subject ID as entered by the experimenter; globally unique (case-insensitive)
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub trials: Vec<Trial>,
}

impl Subject {
    /// Case-insensitive lookup by trial name
    pub fn find_trial(&self, name: &str) -> Option<&Trial> {
        let name = name.trim().to_lowercase();
        self.trials.iter().find(|t| t.name.to_lowercase() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interval_duration() {
        assert_eq!(LookingInterval::new(2000, 2500).duration(), 500);
        assert_eq!(LookingInterval::new(700, 700).duration(), 0);
    }

    #[test]
    fn test_trial_serializes_camel_case() {
        let trial = Trial {
            id: "t-1".to_string(),
            name: "Trial 1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 12, 11, 9, 30, 0).unwrap(),
            total_duration: 3000,
            intervals: vec![LookingInterval::new(0, 1000)],
        };

        let json: serde_json::Value = serde_json::to_value(&trial).unwrap();
        assert_eq!(json["totalDuration"], 3000);
        assert_eq!(json["createdAt"], "2024-12-11T09:30:00Z");
        assert_eq!(json["intervals"][0]["startTime"], 0);
        assert_eq!(json["intervals"][0]["endTime"], 1000);
    }

    #[test]
    fn test_looking_state_wire_names() {
        let json = serde_json::to_string(&LookingState::LookingAway).unwrap();
        assert_eq!(json, "\"lookingAway\"");
        assert_eq!(LookingState::LookingAway.as_str(), "lookingAway");
    }

    #[test]
    fn test_find_trial_ignores_case() {
        let subject = Subject {
            id: "s-1".to_string(),
            name: "Subject_001".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 12, 11, 9, 0, 0).unwrap(),
            trials: vec![Trial {
                id: "t-1".to_string(),
                name: "Trial 1".to_string(),
                created_at: Utc.with_ymd_and_hms(2024, 12, 11, 9, 1, 0).unwrap(),
                total_duration: 0,
                intervals: vec![],
            }],
        };

        assert!(subject.find_trial("trial 1").is_some());
        assert!(subject.find_trial("Trial 2").is_none());
    }
}
