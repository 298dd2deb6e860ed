//! Slot grids and access windows.
//!
//! Everything here is a pure function of its arguments. Callers recompute
//! windows from a `Reservation` whenever they need one; nothing is cached.

use crate::domain::model::{AccessWindow, TimeSlot};
use crate::utils::error::{BookingError, Result};
use chrono::{DateTime, Duration, Utc};

/// Enumerates every slot boundary from `day_start` up to and including `day_end`.
///
/// The last label equals `day_end` when the range divides evenly; it is a
/// start-time choice only and does not imply a zero-length reservation.
pub fn generate_slots(
    day_start: TimeSlot,
    day_end: TimeSlot,
    slot_minutes: u32,
) -> Result<Vec<TimeSlot>> {
    if slot_minutes == 0 {
        return Err(BookingError::InvalidConfig {
            field: "slot_minutes".to_string(),
            value: slot_minutes.to_string(),
            reason: "Slot size must be at least one minute".to_string(),
        });
    }

    let start = day_start.minutes_of_day();
    let end = day_end.minutes_of_day();
    if start > end {
        return Err(BookingError::InvalidConfig {
            field: "day_start".to_string(),
            value: day_start.to_string(),
            reason: format!("Day start must not be after day end ({})", day_end),
        });
    }

    let slots = (start..=end)
        .step_by(slot_minutes as usize)
        .map(TimeSlot::from_minutes_of_day)
        .collect();

    Ok(slots)
}

/// Whether `slot` is one of the boundaries `generate_slots` would produce.
pub fn is_on_grid(
    slot: TimeSlot,
    day_start: TimeSlot,
    day_end: TimeSlot,
    slot_minutes: u32,
) -> bool {
    let minute = slot.minutes_of_day();
    let start = day_start.minutes_of_day();
    slot_minutes > 0
        && minute >= start
        && minute <= day_end.minutes_of_day()
        && (minute - start) % slot_minutes == 0
}

pub fn compute_end(start: DateTime<Utc>, duration_minutes: i64) -> Result<DateTime<Utc>> {
    if duration_minutes <= 0 {
        return Err(BookingError::InvalidDuration {
            minutes: duration_minutes,
        });
    }
    Duration::try_minutes(duration_minutes)
        .and_then(|d| start.checked_add_signed(d))
        .ok_or(BookingError::InvalidDuration {
            minutes: duration_minutes,
        })
}

/// Expands `[start, end]` by `grace_minutes` on both sides.
pub fn compute_access_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    grace_minutes: i64,
) -> Result<AccessWindow> {
    if grace_minutes < 0 {
        return Err(BookingError::InvalidGrace {
            minutes: grace_minutes,
        });
    }
    let expand = |grace: Duration| {
        Some(AccessWindow {
            window_start: start.checked_sub_signed(grace)?,
            window_end: end.checked_add_signed(grace)?,
        })
    };
    Duration::try_minutes(grace_minutes)
        .and_then(expand)
        .ok_or(BookingError::InvalidGrace {
            minutes: grace_minutes,
        })
}

/// Inclusive on both bounds.
pub fn is_within_window(
    instant: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    instant >= window_start && instant <= window_end
}

impl AccessWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        is_within_window(instant, self.window_start, self.window_end)
    }
}
