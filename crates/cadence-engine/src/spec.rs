//! Schedule specification and the request/response boundary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::timeofday::TimeOfDay;

/// How often a user's posts go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(ScheduleError::InvalidField {
                field: "frequency",
                reason: format!("expected daily, weekly or monthly, got '{other}'"),
            }),
        }
    }
}

/// A user's recurring posting schedule.
///
/// `time_of_day` is always interpreted in `timezone`. `day_of_week`
/// (0 = Sunday) only matters for weekly schedules, `day_of_month` (1–31,
/// clamped to shorter months) only for monthly ones. The resolver treats a
/// missing or out-of-range day as a degraded plain-period cadence rather
/// than an error, so a spec rebuilt from corrupt storage still schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub frequency: Frequency,
    pub time_of_day: TimeOfDay,
    pub day_of_week: Option<u8>,
    pub day_of_month: Option<u8>,
    pub timezone: Tz,
}

/// A schedule-change request, shape-agnostic of transport.
///
/// Required fields are `Option` so that any front door (HTTP handler, batch
/// job, CLI) can funnel partial input through [`validate`](Self::validate)
/// and get back an error naming the missing field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub user_id: String,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<u8>,
    #[serde(default)]
    pub day_of_month: Option<u8>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl UpdateScheduleRequest {
    /// Validate into a [`ScheduleSpec`].
    ///
    /// Missing `frequency`/`time_of_day`, a missing `day_of_week` for a
    /// weekly schedule, a missing or out-of-range `day_of_month` for a
    /// monthly one, and an unknown timezone are all rejected by field name.
    /// A *present but malformed* time-of-day string falls open to 09:00 per
    /// [`TimeOfDay::parse`]; an absent timezone defaults to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] naming the offending field.
    pub fn validate(&self) -> Result<ScheduleSpec, ScheduleError> {
        if self.user_id.trim().is_empty() {
            return Err(ScheduleError::MissingField("user_id"));
        }

        let frequency = self
            .frequency
            .ok_or(ScheduleError::MissingField("frequency"))?;

        let raw_time = self
            .time_of_day
            .as_deref()
            .ok_or(ScheduleError::MissingField("time_of_day"))?;
        let time_of_day = TimeOfDay::parse(raw_time);

        let (day_of_week, day_of_month) = match frequency {
            Frequency::Daily => (None, None),
            Frequency::Weekly => {
                let day = self
                    .day_of_week
                    .ok_or(ScheduleError::MissingField("day_of_week"))?;
                if day > 6 {
                    return Err(ScheduleError::InvalidField {
                        field: "day_of_week",
                        reason: format!("expected 0-6 (0 = Sunday), got {day}"),
                    });
                }
                (Some(day), None)
            }
            Frequency::Monthly => {
                let day = self
                    .day_of_month
                    .ok_or(ScheduleError::MissingField("day_of_month"))?;
                if !(1..=31).contains(&day) {
                    return Err(ScheduleError::InvalidField {
                        field: "day_of_month",
                        reason: format!("expected 1-31, got {day}"),
                    });
                }
                (None, Some(day))
            }
        };

        let timezone = match self.timezone.as_deref() {
            None | Some("") => Tz::UTC,
            Some(name) => name.parse::<Tz>().map_err(|_| ScheduleError::InvalidField {
                field: "timezone",
                reason: format!("'{name}' is not an IANA timezone name"),
            })?,
        };

        Ok(ScheduleSpec {
            frequency,
            time_of_day,
            day_of_week,
            day_of_month,
            timezone,
        })
    }
}

/// The outcome of a schedule change, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateScheduleResult {
    /// Slot reserved for the next newly created post.
    pub next_run_at: DateTime<Utc>,
    /// Size of the reconciled backlog.
    pub updated_posts_count: usize,
}
