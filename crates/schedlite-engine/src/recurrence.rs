//! Recurrence calculator: pure timestamp arithmetic, no I/O.

use chrono::{Duration, Months, NaiveDateTime};

use schedlite_types::Frequency;

use crate::{EngineError, Result};

/// Compute the next occurrence of a repeating task.
///
/// Monthly advancement preserves the day of month where the target month has
/// it and clamps to the target month's last day otherwise (Jan 31 -> Feb 28).
/// Calling this for [`Frequency::Once`] is a contract violation.
pub fn advance(at: NaiveDateTime, frequency: Frequency) -> Result<NaiveDateTime> {
    let next = match frequency {
        Frequency::Once => return Err(EngineError::InvalidFrequency),
        Frequency::Hourly => at.checked_add_signed(Duration::hours(1)),
        Frequency::Daily => at.checked_add_signed(Duration::days(1)),
        Frequency::Weekly => at.checked_add_signed(Duration::days(7)),
        Frequency::Monthly => at.checked_add_months(Months::new(1)),
    };
    next.ok_or(EngineError::TimeOutOfRange)
}
