//! Occurrence resolution: the offset-th firing of a recurring slot.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::spec::{Frequency, ScheduleSpec};

/// Compute the offset-th occurrence of a recurring slot as a UTC instant.
///
/// `now` anchors exactly one decision: whether today's slot has already
/// passed. Offset 0 is the next occurrence strictly after `now`; offset `n`
/// advances `n` whole periods from there without re-checking against the
/// clock, so run-times are strictly increasing in `offset`.
///
/// All wall-clock arithmetic happens in `spec.timezone`, so crossing a DST
/// transition keeps the local time-of-day fixed instead of drifting by the
/// offset change. Nonexistent local times (spring-forward gap) map to the
/// first valid wall-clock instant after the gap; ambiguous ones (fall-back)
/// take the earlier instant.
///
/// This function never fails: if the date arithmetic cannot produce a
/// representable instant, it logs a warning and returns the deterministic
/// fallback slot "tomorrow + offset days at 09:00 local".
pub fn resolve(spec: &ScheduleSpec, offset: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    match occurrence(spec, offset, now) {
        Some(instant) => instant,
        None => {
            warn!(
                offset,
                frequency = %spec.frequency,
                timezone = %spec.timezone,
                "occurrence arithmetic failed, using fallback slot"
            );
            fallback_slot(spec.timezone, offset, now)
        }
    }
}

// ── Occurrence arithmetic ───────────────────────────────────────────────────

fn occurrence(spec: &ScheduleSpec, offset: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz = spec.timezone;
    let today = now.with_timezone(&tz).date_naive();
    let time = spec.time_of_day.as_naive();

    let date = match spec.frequency {
        Frequency::Daily => {
            let first = if to_utc(tz, today, time)? <= now {
                today.checked_add_days(Days::new(1))?
            } else {
                today
            };
            first.checked_add_days(Days::new(u64::from(offset)))?
        }
        Frequency::Weekly => {
            let first = match spec.day_of_week {
                Some(target) if target <= 6 => {
                    let current = today.weekday().num_days_from_sunday();
                    let ahead = (i64::from(target) - i64::from(current)).rem_euclid(7);
                    let candidate = today.checked_add_days(Days::new(ahead as u64))?;
                    if ahead == 0 && to_utc(tz, candidate, time)? <= now {
                        candidate.checked_add_days(Days::new(7))?
                    } else {
                        candidate
                    }
                }
                // No usable weekday: degrade to a plain 7-day cadence.
                _ => {
                    if to_utc(tz, today, time)? <= now {
                        today.checked_add_days(Days::new(7))?
                    } else {
                        today
                    }
                }
            };
            first.checked_add_days(Days::new(7 * u64::from(offset)))?
        }
        Frequency::Monthly => {
            let day = match spec.day_of_month {
                Some(d) if (1..=31).contains(&d) => u32::from(d),
                // No usable day-of-month: anchor on today's day number.
                _ => today.day(),
            };
            let first = {
                let candidate = clamped_date(today.year(), today.month(), day)?;
                if to_utc(tz, candidate, time)? <= now {
                    // Roll to next month and clamp against THAT month's
                    // length; clamping in the source month can skip a month
                    // or land in the wrong one for day-31 specs.
                    let (year, month) = add_months(today.year(), today.month(), 1)?;
                    clamped_date(year, month, day)?
                } else {
                    candidate
                }
            };
            let (year, month) = add_months(first.year(), first.month(), offset)?;
            clamped_date(year, month, day)?
        }
    };

    to_utc(tz, date, time)
}

/// The deterministic recovery slot: tomorrow + `offset` days at 09:00 local.
fn fallback_slot(tz: Tz, offset: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let date = now
        .with_timezone(&tz)
        .date_naive()
        .checked_add_days(Days::new(1 + u64::from(offset)))
        .unwrap_or(NaiveDate::MAX);
    let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
    // Last resort reads the wall-clock time as UTC; still deterministic.
    to_utc(tz, date, nine).unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(nine)))
}

// ── Calendar helpers ────────────────────────────────────────────────────────

/// Map a local wall-clock time in `tz` to a UTC instant.
///
/// Spring-forward gaps resolve to the first valid wall-clock instant after
/// the gap (probed in 30-minute steps, which covers half-hour transition
/// zones); fall-back ambiguity takes the earlier instant.
fn to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..4 {
                probe = probe.checked_add_signed(chrono::Duration::minutes(30))?;
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                        return Some(dt.with_timezone(&Utc));
                    }
                    LocalResult::None => {}
                }
            }
            None
        }
    }
}

/// The requested day-of-month clamped to the length of the target month.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    // Last day of the month = the day before the 1st of the next month.
    let (next_year, next_month) = add_months(year, month, 1)?;
    let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()?
        .day();
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

fn add_months(year: i32, month: u32, offset: u32) -> Option<(i32, u32)> {
    let total = i64::from(year) * 12 + i64::from(month) - 1 + i64::from(offset);
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = (total.rem_euclid(12) + 1) as u32;
    Some((year, month))
}

// ── Tests ───────────────────────────────────────────────────────────────────
