//! Fail-open time-of-day parsing.

use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A wall-clock time of day at minute precision.
///
/// Parsing is fail-open: malformed input yields [`TimeOfDay::DEFAULT`]
/// (09:00) instead of an error, because a corrupt stored time must never
/// silently stop all future posts for a user. A *missing* time-of-day in a
/// client request is a different matter and is rejected during request
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// The documented fallback: 09:00.
    pub const DEFAULT: TimeOfDay = TimeOfDay { hour: 9, minute: 0 };

    /// Construct from components, rejecting out-of-range values.
    pub fn new(hour: u8, minute: u8) -> Option<TimeOfDay> {
        if hour <= 23 && minute <= 59 {
            Some(TimeOfDay { hour, minute })
        } else {
            None
        }
    }

    /// Parse an `"HH:MM"` or `"HH:MM:SS"` string.
    ///
    /// Splits on `:` and reads the first two components as integers;
    /// seconds are accepted and discarded. Non-numeric, out-of-range, or
    /// missing components all yield [`TimeOfDay::DEFAULT`].
    pub fn parse(input: &str) -> TimeOfDay {
        let mut parts = input.split(':');
        let hour = parts.next().and_then(|p| p.trim().parse::<u8>().ok());
        let minute = parts.next().and_then(|p| p.trim().parse::<u8>().ok());
        match (hour, minute) {
            (Some(h), Some(m)) => TimeOfDay::new(h, m).unwrap_or(TimeOfDay::DEFAULT),
            _ => TimeOfDay::DEFAULT,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// The equivalent `NaiveTime` (seconds are always zero).
    pub fn as_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_default()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
