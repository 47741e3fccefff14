//! Provider availability models.

use serde::{Deserialize, Serialize};

/// A weekly bookable window for one (provider, weekday, modality) tuple.
///
/// At most one active window exists per tuple; overlapping windows for the
/// same tuple are not supported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    /// Provider full name
    pub provider: String,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u8,
    /// Exam type this window serves
    pub modality: String,
    /// Window start, HH:MM, inclusive
    pub start_time: String,
    /// Window end, HH:MM, exclusive
    pub end_time: String,
    /// Default service duration in minutes
    pub slot_minutes: i64,
    pub active: bool,
}

impl AvailabilityWindow {
    pub fn new(
        provider: String,
        weekday: u8,
        modality: String,
        start_time: String,
        end_time: String,
        slot_minutes: i64,
    ) -> Self {
        Self {
            provider,
            weekday,
            modality,
            start_time,
            end_time,
            slot_minutes,
            active: true,
        }
    }

    /// Whether `time` falls within `[start, end)`.
    ///
    /// Comparison is on minute-of-day integers, not wall-clock arithmetic, so
    /// the two stores cannot drift over timezones. Malformed times never
    /// match.
    pub fn contains(&self, time: &str) -> bool {
        match (
            minute_of_day(&self.start_time),
            minute_of_day(&self.end_time),
            minute_of_day(time),
        ) {
            (Some(start), Some(end), Some(t)) => start <= t && t < end,
            _ => false,
        }
    }
}

/// Parse an HH:MM string into minutes since midnight.
pub fn minute_of_day(time: &str) -> Option<u32> {
    let (hh, mm) = time.split_once(':')?;
    let hours: u32 = hh.parse().ok()?;
    let minutes: u32 = mm.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}
