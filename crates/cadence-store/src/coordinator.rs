//! The reconciliation transaction coordinator.
//!
//! A schedule edit must land on the settings row and on every pending post
//! as one unit: a backlog half-migrated to a new cadence is data corruption,
//! not partial success. Each request walks the phases
//! `Begin → ReadBacklog → ComputeSlots → PersistSpec → PersistEachPost →
//! Commit`; rollback is reachable from every phase after `Begin` (the
//! transaction guard rolls back when dropped uncommitted). Because the slot
//! computation is a pure function of `(spec, backlog, now)`, a rolled-back
//! request can be retried verbatim.

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use cadence_engine::{reconcile, resolve, BacklogEntry, UpdateScheduleRequest, UpdateScheduleResult};

use crate::error::{Result, StoreError};
use crate::models::{fmt_instant, PostStatus, ScheduledPost};
use crate::queries;
use crate::Database;

/// Phases of one reconciliation request, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Begin,
    ReadBacklog,
    ComputeSlots,
    PersistSpec,
    PersistEachPost,
    Commit,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Begin => "begin",
            Phase::ReadBacklog => "read_backlog",
            Phase::ComputeSlots => "compute_slots",
            Phase::PersistSpec => "persist_spec",
            Phase::PersistEachPost => "persist_each_post",
            Phase::Commit => "commit",
        }
    }
}

impl Database {
    /// Apply a schedule edit and re-sequence the user's entire backlog.
    ///
    /// Validation happens before any persistence work, so a malformed
    /// request fails without touching the database. Holding the user's
    /// advisory lock serializes concurrent edits for the same user;
    /// different users proceed independently.
    ///
    /// # Errors
    ///
    /// [`StoreError::Invalid`] for a malformed request (names the field);
    /// [`StoreError::Storage`] when persistence fails — the transaction has
    /// rolled back and nothing was migrated.
    pub fn apply_schedule_update(
        &self,
        request: &UpdateScheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<UpdateScheduleResult> {
        let spec = request.validate()?;
        let user_id = request.user_id.clone();

        let lock = self.user_lock(&user_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            debug!(user_id = %user_id, phase = Phase::Begin.as_str(), "reconciliation started");

            debug!(user_id = %user_id, phase = Phase::ReadBacklog.as_str());
            let backlog = queries::pending_backlog(&tx, &user_id)?;
            let entries: Vec<BacklogEntry> = backlog
                .iter()
                .map(|post| BacklogEntry {
                    post_id: post.id.clone(),
                    created_at: post.created_at,
                })
                .collect();

            debug!(
                user_id = %user_id,
                phase = Phase::ComputeSlots.as_str(),
                backlog = entries.len()
            );
            let outcome = reconcile(&spec, &entries, now);

            debug!(user_id = %user_id, phase = Phase::PersistSpec.as_str());
            tx.execute(
                "INSERT INTO schedule_settings
                    (user_id, frequency, time_of_day, day_of_week, day_of_month, timezone,
                     next_run_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
                 ON CONFLICT(user_id) DO UPDATE SET
                    frequency = excluded.frequency,
                    time_of_day = excluded.time_of_day,
                    day_of_week = excluded.day_of_week,
                    day_of_month = excluded.day_of_month,
                    timezone = excluded.timezone,
                    next_run_at = excluded.next_run_at,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    user_id,
                    spec.frequency.as_str(),
                    spec.time_of_day.to_string(),
                    spec.day_of_week,
                    spec.day_of_month,
                    spec.timezone.name(),
                    fmt_instant(outcome.next_run_at),
                ],
            )?;

            debug!(user_id = %user_id, phase = Phase::PersistEachPost.as_str());
            for assignment in &outcome.assignments {
                let changed = tx.execute(
                    "UPDATE scheduled_posts SET run_at = ?1, timezone = ?2
                     WHERE id = ?3 AND status = 'pending'",
                    rusqlite::params![
                        fmt_instant(assignment.run_at),
                        spec.timezone.name(),
                        assignment.post_id
                    ],
                )?;
                if changed != 1 {
                    return Err(StoreError::Corrupt(format!(
                        "pending post {} vanished mid-reconciliation",
                        assignment.post_id
                    )));
                }
            }

            debug!(user_id = %user_id, phase = Phase::Commit.as_str());
            tx.commit()?;

            info!(
                user_id = %user_id,
                posts = outcome.assignments.len(),
                next_run_at = %outcome.next_run_at,
                "schedule reconciled"
            );
            Ok(UpdateScheduleResult {
                next_run_at: outcome.next_run_at,
                updated_posts_count: outcome.assignments.len(),
            })
        })
    }

    /// Create a post on the reserved next slot and advance the reservation.
    ///
    /// The new post's `run_at` is seeded from the stored `next_run_at`
    /// verbatim; the settings row then moves its reservation to the slot
    /// after the grown backlog. Both writes share one transaction.
    pub fn create_post(
        &self,
        user_id: &str,
        content_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduledPost> {
        let lock = self.user_lock(user_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let settings = queries::settings_row(&tx, user_id)?
                .ok_or_else(|| StoreError::SettingsNotFound(user_id.to_string()))?;
            let backlog_len = queries::pending_count(&tx, user_id)?;

            let post = ScheduledPost {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                content_id: content_id.to_string(),
                created_at: now,
                run_at: settings.next_run_at,
                timezone: settings.spec.timezone.name().to_string(),
                status: PostStatus::Pending,
            };
            tx.execute(
                "INSERT INTO scheduled_posts
                    (id, user_id, content_id, created_at, run_at, timezone, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    post.id,
                    post.user_id,
                    post.content_id,
                    fmt_instant(post.created_at),
                    fmt_instant(post.run_at),
                    post.timezone,
                    post.status.as_str()
                ],
            )?;

            let next_run_at = resolve(&settings.spec, (backlog_len + 1) as u32, now);
            tx.execute(
                "UPDATE schedule_settings SET next_run_at = ?1, updated_at = datetime('now')
                 WHERE user_id = ?2",
                rusqlite::params![fmt_instant(next_run_at), user_id],
            )?;

            tx.commit()?;

            info!(
                user_id = %user_id,
                post_id = %post.id,
                run_at = %post.run_at,
                next_run_at = %next_run_at,
                "post scheduled"
            );
            Ok(post)
        })
    }
}
