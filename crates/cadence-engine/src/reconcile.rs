//! Backlog reconciliation: re-sequencing pending posts after a schedule edit.

use chrono::{DateTime, Utc};

use crate::resolve::resolve;
use crate::spec::ScheduleSpec;

/// A pending post as the reconciler sees it: identity plus backlog position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogEntry {
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

/// One post's new run-time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub post_id: String,
    pub run_at: DateTime<Utc>,
}

/// The full result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// New run-times, in backlog (creation) order.
    pub assignments: Vec<SlotAssignment>,
    /// Slot for the next post to be created (offset = backlog length).
    pub next_run_at: DateTime<Utc>,
}

/// Assign every pending post the occurrence matching its backlog position.
///
/// The post created first gets offset 0, the second offset 1, and so on;
/// because [`resolve`] is strictly increasing in offset, creation order and
/// run-time order always agree and no two posts share a slot. The input is
/// sorted here (by `created_at`, then post id as a total-order tie-break)
/// rather than trusting the caller's ordering.
///
/// An empty backlog still yields `next_run_at` from offset 0, so a schedule
/// edit with nothing pending correctly primes the next slot.
///
/// Pure function of `(spec, backlog, now)` — re-running it with the same
/// inputs returns identical assignments, which is what makes retrying a
/// failed persistence pass safe.
pub fn reconcile(
    spec: &ScheduleSpec,
    backlog: &[BacklogEntry],
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    let mut ordered: Vec<&BacklogEntry> = backlog.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.post_id.cmp(&b.post_id))
    });

    let assignments = ordered
        .iter()
        .enumerate()
        .map(|(index, entry)| SlotAssignment {
            post_id: entry.post_id.clone(),
            run_at: resolve(spec, index as u32, now),
        })
        .collect();

    ReconcileOutcome {
        assignments,
        next_run_at: resolve(spec, backlog.len() as u32, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Frequency;
    use crate::timeofday::TimeOfDay;
    use chrono::TimeZone;
    use chrono_tz::Tz;
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn entry(id: &str, created_at: DateTime<Utc>) -> BacklogEntry {
        BacklogEntry {
            post_id: id.to_string(),
            created_at,
        }
    }

    fn monthly_31() -> ScheduleSpec {
        ScheduleSpec {
            frequency: Frequency::Monthly,
            time_of_day: TimeOfDay::parse("10:00"),
            day_of_week: None,
            day_of_month: Some(31),
            timezone: Tz::UTC,
        }
    }

    fn daily_nine() -> ScheduleSpec {
        ScheduleSpec {
            frequency: Frequency::Daily,
            time_of_day: TimeOfDay::parse("09:00"),
            day_of_week: None,
            day_of_month: None,
            timezone: Tz::UTC,
        }
    }

    #[test]
    fn test_backlog_of_five_walks_month_ends() {
        // Scenario: day-31 monthly spec edited in February — every post
        // lands on its own month's clamped day, not a fixed day number.
        let now = utc(2024, 2, 10, 12, 0);
        let backlog: Vec<BacklogEntry> = (0..5)
            .map(|i| entry(&format!("p{i}"), utc(2024, 1, 1, 0, i)))
            .collect();

        let outcome = reconcile(&monthly_31(), &backlog, now);
        let runs: Vec<DateTime<Utc>> = outcome.assignments.iter().map(|a| a.run_at).collect();
        assert_eq!(
            runs,
            vec![
                utc(2024, 2, 29, 10, 0),
                utc(2024, 3, 31, 10, 0),
                utc(2024, 4, 30, 10, 0),
                utc(2024, 5, 31, 10, 0),
                utc(2024, 6, 30, 10, 0),
            ]
        );
        assert_eq!(outcome.next_run_at, utc(2024, 7, 31, 10, 0));
    }

    #[test]
    fn test_empty_backlog_still_primes_next_slot() {
        let now = utc(2024, 1, 1, 10, 0);
        let outcome = reconcile(&daily_nine(), &[], now);
        assert!(outcome.assignments.is_empty());
        assert_eq!(outcome.next_run_at, utc(2024, 1, 2, 9, 0));
    }

    #[test]
    fn test_creation_order_wins_over_input_order() {
        let now = utc(2024, 1, 1, 10, 0);
        // Deliberately shuffled input.
        let backlog = vec![
            entry("late", utc(2024, 1, 1, 3, 0)),
            entry("first", utc(2024, 1, 1, 1, 0)),
            entry("middle", utc(2024, 1, 1, 2, 0)),
        ];
        let outcome = reconcile(&daily_nine(), &backlog, now);
        let ids: Vec<&str> = outcome
            .assignments
            .iter()
            .map(|a| a.post_id.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "middle", "late"]);
        assert_eq!(outcome.assignments[0].run_at, utc(2024, 1, 2, 9, 0));
        assert_eq!(outcome.assignments[2].run_at, utc(2024, 1, 4, 9, 0));
    }

    #[test]
    fn test_equal_created_at_breaks_tie_on_post_id() {
        let now = utc(2024, 1, 1, 10, 0);
        let same = utc(2024, 1, 1, 0, 0);
        let backlog = vec![entry("b", same), entry("a", same)];
        let outcome = reconcile(&daily_nine(), &backlog, now);
        assert_eq!(outcome.assignments[0].post_id, "a");
        assert_eq!(outcome.assignments[1].post_id, "b");
    }

    #[test]
    fn test_next_run_at_is_after_last_assignment() {
        let now = utc(2024, 1, 1, 10, 0);
        let backlog: Vec<BacklogEntry> = (0..7)
            .map(|i| entry(&format!("p{i}"), utc(2024, 1, 1, 0, i)))
            .collect();
        let outcome = reconcile(&daily_nine(), &backlog, now);
        let last = outcome.assignments.last().unwrap().run_at;
        assert!(outcome.next_run_at > last);
    }

    proptest! {
        // Run-times come out strictly increasing in creation order
        #[test]
        fn prop_order_preserved_and_collision_free(minutes in proptest::collection::vec(0u32..5000, 0..25)) {
            let now = utc(2024, 1, 1, 10, 0);
            let backlog: Vec<BacklogEntry> = minutes
                .iter()
                .enumerate()
                .map(|(i, m)| entry(&format!("p{i:02}"), now - chrono::Duration::minutes(i64::from(*m))))
                .collect();

            let outcome = reconcile(&monthly_31(), &backlog, now);
            for pair in outcome.assignments.windows(2) {
                prop_assert!(pair[0].run_at < pair[1].run_at);
            }
            if let Some(last) = outcome.assignments.last() {
                prop_assert!(outcome.next_run_at > last.run_at);
            }

            // And the assignment order matches backlog order
            let mut sorted = backlog.clone();
            sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.post_id.cmp(&b.post_id)));
            let expected: Vec<&str> = sorted.iter().map(|e| e.post_id.as_str()).collect();
            let actual: Vec<&str> = outcome.assignments.iter().map(|a| a.post_id.as_str()).collect();
            prop_assert_eq!(expected, actual);
        }

        // Reconciling twice with no intervening changes is a no-op
        #[test]
        fn prop_idempotent(count in 0usize..20) {
            let now = utc(2024, 3, 9, 23, 30);
            let backlog: Vec<BacklogEntry> = (0..count)
                .map(|i| entry(&format!("p{i:02}"), utc(2024, 1, 1, 0, i as u32)))
                .collect();
            let first = reconcile(&daily_nine(), &backlog, now);
            let second = reconcile(&daily_nine(), &backlog, now);
            prop_assert_eq!(first, second);
        }
    }
}
