//! CSV encoding
//!
//! Serializes trials into row-oriented text for analysis. Output is
//! deterministic: every data field is double-quoted, times use
//! `HH:MM:SS.mmm`, rows are joined with `\n`, and there is no trailing
//! newline.

use crate::format::{csv_filename, format_timestamp};
use crate::types::{Subject, Trial};

/// Header for single-trial exports
pub const TRIAL_HEADER: [&str; 6] = [
    "Trial Name",
    "Total Duration",
    "Interval",
    "Start Time",
    "End Time",
    "Duration",
];

/// Header for per-subject exports
pub const SUBJECT_HEADER: [&str; 7] = [
    "Subject ID",
    "Trial Number",
    "Total Duration",
    "Interval",
    "Start Time",
    "End Time",
    "Duration",
];

/// A CSV document ready to hand to a file sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub contents: String,
}

impl CsvExport {
    pub fn for_trial(trial: &Trial) -> Self {
        Self {
            filename: trial_filename(trial),
            contents: encode_trial(trial),
        }
    }

    pub fn for_subject(subject: &Subject) -> Self {
        Self {
            filename: subject_filename(subject),
            contents: encode_subject(subject),
        }
    }
}

/// Encode one trial: one row per interval, or a single row with empty
/// interval fields when there are none.
pub fn encode_trial(trial: &Trial) -> String {
    let mut rows = vec![TRIAL_HEADER.join(",")];
    let total = format_timestamp(trial.total_duration);

    for cells in interval_cells(trial) {
        let mut row = vec![quote(&trial.name), quote(&total)];
        row.extend(cells.iter().map(|c| quote(c)));
        rows.push(row.join(","));
    }

    rows.join("\n")
}

/// Encode every trial of a subject, numbering trials from 1.
///
/// The `Subject ID` column carries the subject's name, which is the ID the
/// experimenter entered.
pub fn encode_subject(subject: &Subject) -> String {
    let mut rows = vec![SUBJECT_HEADER.join(",")];

    for (index, trial) in subject.trials.iter().enumerate() {
        let trial_number = (index + 1).to_string();
        let total = format_timestamp(trial.total_duration);

        for cells in interval_cells(trial) {
            let mut row = vec![quote(&subject.name), quote(&trial_number), quote(&total)];
            row.extend(cells.iter().map(|c| quote(c)));
            rows.push(row.join(","));
        }
    }

    rows.join("\n")
}

pub fn trial_filename(trial: &Trial) -> String {
    csv_filename(&trial.name, &trial.created_at)
}

pub fn subject_filename(subject: &Subject) -> String {
    csv_filename(&subject.name, &subject.created_at)
}

/// `[Interval, Start Time, End Time, Duration]` per interval, with a single
/// all-empty entry for a trial without intervals
fn interval_cells(trial: &Trial) -> Vec<[String; 4]> {
    if trial.intervals.is_empty() {
        return vec![Default::default()];
    }

    trial
        .intervals
        .iter()
        .enumerate()
        .map(|(index, interval)| {
            [
                (index + 1).to_string(),
                format_timestamp(interval.start_time),
                format_timestamp(interval.end_time),
                format_timestamp(interval.duration()),
            ]
        })
        .collect()
}

/// Wrap in double quotes, doubling any embedded quote
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
