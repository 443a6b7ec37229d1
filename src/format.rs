//! Time and filename formatting helpers shared by the timeline, CSV export
//! and the CLI.

use chrono::{DateTime, Utc};

use crate::types::Millis;

/// Format milliseconds as `HH:MM:SS.mmm`.
///
/// Hours are zero-padded to two digits but never truncated, so 100 hours
/// renders as `100:00:00.000`.
pub fn format_timestamp(ms: Millis) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = ms % 1000;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Format milliseconds as `MM:SS.t` (tenths of a second) for compact display.
pub fn format_duration_short(ms: Millis) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let tenths = (ms % 1000) / 100;

    format!("{minutes:02}:{seconds:02}.{tenths}")
}

/// Short date for listings, e.g. `Dec 11`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %-d").to_string()
}

/// Make a name safe for use in a filename.
///
/// Lower-cases, collapses every run of characters outside `[a-z0-9]` into a
/// single hyphen, and trims leading/trailing hyphens.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    out
}

/// `sanitize(name) + "_" + YYYY-MM-DD + ".csv"`
pub fn csv_filename(name: &str, created_at: &DateTime<Utc>) -> String {
    format!(
        "{}_{}.csv",
        sanitize_filename(name),
        created_at.format("%Y-%m-%d")
    )
}
