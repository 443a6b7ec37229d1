//! Timeline derivation
//!
//! Tiles a trial's duration into looking / looking-away / neutral segments,
//! places time-axis markers, and computes summary statistics for review.

use serde::{Deserialize, Serialize};

use crate::format::format_duration_short;
use crate::types::{LookingInterval, Millis, Trial};

/// Marker step for recordings shorter than 30 s
const STEP_SHORT_MS: Millis = 5_000;
/// Marker step for recordings shorter than 2 min
const STEP_MEDIUM_MS: Millis = 15_000;
/// Marker step for recordings shorter than 5 min
const STEP_LONG_MS: Millis = 30_000;
/// Marker step for anything longer
const STEP_VERY_LONG_MS: Millis = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    Looking,
    LookingAway,
    /// Gap before the first interval, when the trial did not open looking
    Neutral,
}

/// One span of the tiled timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub kind: SegmentKind,
    pub start_time: Millis,
    pub end_time: Millis,
    /// Share of the total duration (0-1)
    pub fraction: f64,
}

impl Segment {
    pub fn duration(&self) -> Millis {
        self.end_time - self.start_time
    }

    /// Share of the total duration as a percentage, for bar widths
    pub fn width_percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Tick on the time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeMarker {
    pub time: Millis,
    /// `time / total_duration` (0-1)
    pub position: f64,
    /// `MM:SS.t`
    pub label: String,
}

/// Summary statistics of a trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStats {
    pub total_looking_time: Millis,
    /// Looking time as a percentage of total duration; 0 for empty trials
    pub looking_percent: f64,
    pub interval_count: usize,
}

impl TrialStats {
    pub fn of(trial: &Trial) -> Self {
        let total_looking_time = trial.total_looking_time();
        let looking_percent = if trial.total_duration > 0 {
            total_looking_time as f64 / trial.total_duration as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_looking_time,
            looking_percent,
            interval_count: trial.intervals.len(),
        }
    }
}

/// Everything a timeline view needs for one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub total_duration: Millis,
    pub segments: Vec<Segment>,
    pub markers: Vec<TimeMarker>,
    pub stats: TrialStats,
}

impl Timeline {
    pub fn derive(trial: &Trial) -> Self {
        Self {
            total_duration: trial.total_duration,
            segments: segments(trial),
            markers: markers(trial.total_duration),
            stats: TrialStats::of(trial),
        }
    }
}

/// Tile `[0, total_duration]` with segments.
///
/// Intervals are sorted by start first. Overlapping or out-of-range intervals
/// are clamped to the cursor and the total duration so the result still
/// tiles exactly. A zero-duration trial has no segments.
pub fn segments(trial: &Trial) -> Vec<Segment> {
    let total = trial.total_duration;
    if total == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<LookingInterval> = trial.intervals.clone();
    sorted.sort_by_key(|i| i.start_time);

    let mut result = Vec::with_capacity(sorted.len() * 2 + 1);
    let mut cursor: Millis = 0;

    for interval in sorted {
        let start = interval.start_time.clamp(cursor, total);
        let end = interval.end_time.clamp(start, total);

        if start > cursor {
            let kind = if cursor == 0 {
                SegmentKind::Neutral
            } else {
                SegmentKind::LookingAway
            };
            result.push(segment(kind, cursor, start, total));
        }

        result.push(segment(SegmentKind::Looking, start, end, total));
        cursor = end;
    }

    if cursor < total {
        result.push(segment(SegmentKind::LookingAway, cursor, total, total));
    }

    result
}

fn segment(kind: SegmentKind, start_time: Millis, end_time: Millis, total: Millis) -> Segment {
    Segment {
        kind,
        start_time,
        end_time,
        fraction: (end_time - start_time) as f64 / total as f64,
    }
}

/// Marker spacing for a recording of `total_duration`
pub fn marker_step(total_duration: Millis) -> Millis {
    if total_duration < 30_000 {
        STEP_SHORT_MS
    } else if total_duration < 120_000 {
        STEP_MEDIUM_MS
    } else if total_duration < 300_000 {
        STEP_LONG_MS
    } else {
        STEP_VERY_LONG_MS
    }
}

/// One marker every step from 0 through `total_duration` inclusive
pub fn markers(total_duration: Millis) -> Vec<TimeMarker> {
    if total_duration == 0 {
        return Vec::new();
    }

    let step = marker_step(total_duration);
    (0..=total_duration)
        .step_by(step as usize)
        .map(|time| TimeMarker {
            time,
            position: time as f64 / total_duration as f64,
            label: format_duration_short(time),
        })
        .collect()
}
