//! Reads and collaborator-facing writes.
//!
//! Free functions take a bare `Connection` so the coordinator can reuse
//! them inside an open transaction; the `Database` methods wrap them for
//! standalone callers.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use cadence_engine::{Frequency, ScheduleSpec, TimeOfDay};

use crate::error::{Result, StoreError};
use crate::models::{fmt_instant, parse_instant, PostStatus, ScheduledPost, StoredSettings};
use crate::Database;

impl Database {
    /// Current schedule settings for a user, if any.
    pub fn get_settings(&self, user_id: &str) -> Result<Option<StoredSettings>> {
        self.with_conn(|conn| settings_row(conn, user_id))
    }

    /// A user's pending posts in backlog (creation) order.
    pub fn backlog(&self, user_id: &str) -> Result<Vec<ScheduledPost>> {
        self.with_conn(|conn| pending_backlog(conn, user_id))
    }

    pub fn get_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        self.with_conn(|conn| {
            let raw = conn
                .query_row(
                    "SELECT id, user_id, content_id, created_at, run_at, timezone, status
                     FROM scheduled_posts WHERE id = ?1",
                    [post_id],
                    raw_post,
                )
                .optional()?;
            raw.map(decode_post).transpose()
        })
    }

    /// Pending posts whose run time has arrived, soonest first.
    ///
    /// This is the publishing collaborator's poll; what happens to a due
    /// post afterwards is its business, reported back via
    /// [`set_post_status`](Database::set_post_status).
    pub fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content_id, created_at, run_at, timezone, status
                 FROM scheduled_posts
                 WHERE status = 'pending' AND run_at <= ?1
                 ORDER BY run_at, id",
            )?;
            let rows = stmt.query_map([fmt_instant(now)], raw_post)?;
            collect_posts(rows)
        })
    }

    /// Move a post out of `pending`. Refuses to touch anything else about
    /// the row — `run_at` stays the reconciler's property.
    pub fn set_post_status(&self, post_id: &str, status: PostStatus) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE scheduled_posts SET status = ?1 WHERE id = ?2 AND status = 'pending'",
                rusqlite::params![status.as_str(), post_id],
            )?;
            if changed == 1 {
                return Ok(());
            }
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM scheduled_posts WHERE id = ?1)",
                [post_id],
                |row| row.get(0),
            )?;
            if exists {
                Err(StoreError::PostNotPending(post_id.to_string()))
            } else {
                Err(StoreError::PostNotFound(post_id.to_string()))
            }
        })
    }
}

type RawPost = (String, String, String, String, String, String, String);

fn raw_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPost> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_post(raw: RawPost) -> Result<ScheduledPost> {
    let (id, user_id, content_id, created_at, run_at, timezone, status) = raw;
    let status = PostStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown post status '{status}'")))?;
    Ok(ScheduledPost {
        created_at: parse_instant(&created_at)?,
        run_at: parse_instant(&run_at)?,
        id,
        user_id,
        content_id,
        timezone,
        status,
    })
}

fn collect_posts(
    rows: impl Iterator<Item = rusqlite::Result<RawPost>>,
) -> Result<Vec<ScheduledPost>> {
    let mut posts = Vec::new();
    for raw in rows {
        posts.push(decode_post(raw?)?);
    }
    Ok(posts)
}

pub(crate) fn pending_backlog(conn: &Connection, user_id: &str) -> Result<Vec<ScheduledPost>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content_id, created_at, run_at, timezone, status
         FROM scheduled_posts
         WHERE user_id = ?1 AND status = 'pending'
         ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map([user_id], raw_post)?;
    collect_posts(rows)
}

pub(crate) fn pending_count(conn: &Connection, user_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM scheduled_posts WHERE user_id = ?1 AND status = 'pending'",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub(crate) fn settings_row(conn: &Connection, user_id: &str) -> Result<Option<StoredSettings>> {
    let raw = conn
        .query_row(
            "SELECT user_id, frequency, time_of_day, day_of_week, day_of_month, timezone, next_run_at
             FROM schedule_settings WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((user_id, frequency, time_of_day, day_of_week, day_of_month, timezone, next_run_at)) =
        raw
    else {
        return Ok(None);
    };

    let frequency = frequency
        .parse::<Frequency>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    // Stored timezone and time-of-day read fail-open: a corrupt value must
    // not strand the user's whole schedule.
    let tz = timezone.parse::<Tz>().unwrap_or_else(|_| {
        warn!(user_id = %user_id, timezone = %timezone, "stored timezone unparseable, using UTC");
        Tz::UTC
    });

    let spec = ScheduleSpec {
        frequency,
        time_of_day: TimeOfDay::parse(&time_of_day),
        day_of_week: day_of_week.and_then(|d| u8::try_from(d).ok()),
        day_of_month: day_of_month.and_then(|d| u8::try_from(d).ok()),
        timezone: tz,
    };

    Ok(Some(StoredSettings {
        next_run_at: parse_instant(&next_run_at)?,
        user_id,
        spec,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn seed_post(db: &Database, id: &str, user: &str, run_at: DateTime<Utc>, status: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scheduled_posts (id, user_id, content_id, created_at, run_at, timezone, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'UTC', ?6)",
                rusqlite::params![
                    id,
                    user,
                    format!("content-{id}"),
                    fmt_instant(run_at),
                    fmt_instant(run_at),
                    status
                ],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_due_posts_includes_boundary_and_orders_by_run_at() {
        let db = Database::open_in_memory().unwrap();
        let now = utc(2024, 1, 10, 9, 0);
        seed_post(&db, "later", "u", utc(2024, 1, 10, 9, 1), "pending");
        seed_post(&db, "exact", "u", now, "pending");
        seed_post(&db, "early", "u", utc(2024, 1, 10, 8, 0), "pending");
        seed_post(&db, "done", "u", utc(2024, 1, 1, 0, 0), "posted");

        let due = db.due_posts(now).unwrap();
        let ids: Vec<&str> = due.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "exact"]);
    }

    #[test]
    fn test_backlog_is_pending_only_in_creation_order() {
        let db = Database::open_in_memory().unwrap();
        seed_post(&db, "b", "u", utc(2024, 1, 2, 0, 0), "pending");
        seed_post(&db, "a", "u", utc(2024, 1, 1, 0, 0), "pending");
        seed_post(&db, "x", "u", utc(2024, 1, 1, 12, 0), "failed");
        seed_post(&db, "other", "someone-else", utc(2024, 1, 1, 0, 0), "pending");

        let backlog = db.backlog("u").unwrap();
        let ids: Vec<&str> = backlog.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_set_post_status_guards() {
        let db = Database::open_in_memory().unwrap();
        seed_post(&db, "p", "u", utc(2024, 1, 1, 0, 0), "pending");

        db.set_post_status("p", PostStatus::Posted).unwrap();
        assert_eq!(db.get_post("p").unwrap().unwrap().status, PostStatus::Posted);

        // Already left pending
        assert!(matches!(
            db.set_post_status("p", PostStatus::Failed),
            Err(StoreError::PostNotPending(_))
        ));
        // Never existed
        assert!(matches!(
            db.set_post_status("ghost", PostStatus::Posted),
            Err(StoreError::PostNotFound(_))
        ));
    }

    #[test]
    fn test_settings_row_reads_fail_open() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO schedule_settings
                    (user_id, frequency, time_of_day, day_of_week, day_of_month, timezone, next_run_at)
                 VALUES ('u', 'weekly', 'garbage', 2, NULL, 'Atlantis/Lost', '2024-01-08T09:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let settings = db.get_settings("u").unwrap().unwrap();
        assert_eq!(settings.spec.frequency, Frequency::Weekly);
        assert_eq!(settings.spec.time_of_day, TimeOfDay::DEFAULT);
        assert_eq!(settings.spec.timezone, Tz::UTC);
        assert_eq!(settings.spec.day_of_week, Some(2));
        assert_eq!(settings.next_run_at, utc(2024, 1, 8, 9, 0));
    }
}
