//! Bidirectional conversion between wall-clock strings and minutes-from-midnight.
//!
//! Accepts either a bare `HH:MM:SS` string or an ISO datetime whose time
//! portion is the segment after the last `T` (e.g. `2026-07-28T09:30:00`).
//! The date portion, if present, is otherwise ignored by this module — callers
//! that care about cross-date semantics (see the normalizer's deadline
//! handling) inspect the original string themselves.

use serde_json::json;

use crate::error::{AppError, AppResult};

/// Minutes from midnight, in `[0, 1440]`.
pub type Minute = i32;

pub const MINUTES_PER_DAY: Minute = 1440;

/// Parses `HH:MM:SS`, or an ISO datetime ending in `THH:MM:SS`, into a [`Minute`].
pub fn parse_time(value: &str) -> AppResult<Minute> {
    let time_part = match value.rfind('T') {
        Some(idx) => &value[idx + 1..],
        None => value,
    };

    let fields: Vec<&str> = time_part.split(':').collect();
    if fields.len() != 3 {
        return Err(bad_format(value, "expected HH:MM:SS"));
    }

    let hour: i32 = fields[0]
        .parse()
        .map_err(|_| bad_format(value, "hour is not an integer"))?;
    let minute: i32 = fields[1]
        .parse()
        .map_err(|_| bad_format(value, "minute is not an integer"))?;
    let second: i32 = fields[2]
        .parse()
        .map_err(|_| bad_format(value, "second is not an integer"))?;

    if !(0..=59).contains(&minute) || !(0..=59).contains(&second) {
        return Err(bad_format(value, "minute/second out of range"));
    }

    let total = if hour == 24 {
        if minute != 0 || second != 0 {
            return Err(bad_format(value, "hour 24 only valid as 24:00:00"));
        }
        MINUTES_PER_DAY
    } else if (0..=23).contains(&hour) {
        hour * 60 + minute
    } else {
        return Err(bad_format(value, "hour out of range"));
    };

    Ok(total)
}

/// Formats a [`Minute`] back as zero-padded `HH:MM:SS`, seconds always `"00"`.
pub fn format_time(minute: Minute) -> String {
    let clamped = minute.clamp(0, MINUTES_PER_DAY);
    let hour = clamped / 60;
    let min = clamped % 60;
    format!("{hour:02}:{min:02}:00")
}

fn bad_format(value: &str, reason: &str) -> AppError {
    AppError::BadTimeFormat {
        value: value.to_string(),
        details: Some(json!({ "reason": reason })),
    }
}
