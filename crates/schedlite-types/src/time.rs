//! Schedule time parsing and formatting.
//!
//! Times are naive local wall-clock values. Input accepts `YYYY-MM-DD` (read
//! as midnight) or `YYYY-MM-DD_HH:MM:SS`; an underscore separates date and
//! time so the value survives shell word splitting.

use chrono::{NaiveDate, NaiveDateTime};

/// Format used for the persisted `scheduled_at` column and for display.
pub const SCHEDULE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a caller-supplied schedule time.
///
/// Returns `None` if the input matches neither accepted form.
pub fn parse_schedule_time(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.replace('_', " ");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, SCHEDULE_TIME_FORMAT) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render a schedule time in the persisted/display format.
pub fn format_schedule_time(t: NaiveDateTime) -> String {
    t.format(SCHEDULE_TIME_FORMAT).to_string()
}
