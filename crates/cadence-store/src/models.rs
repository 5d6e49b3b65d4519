//! Database row types and the canonical instant encoding.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use cadence_engine::ScheduleSpec;

use crate::error::StoreError;

/// Lifecycle state of a scheduled post.
///
/// The reconciler only ever touches `pending` posts; the publishing
/// collaborator owns the transitions out of `pending` and never touches
/// `run_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Posted,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<PostStatus> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "posted" => Some(PostStatus::Posted),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }
}

/// One scheduled post as stored.
///
/// `created_at` is immutable and defines backlog order; `run_at` is owned
/// by the reconciler while the post is pending. `timezone` is a display
/// copy of the spec's zone at assignment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub user_id: String,
    pub content_id: String,
    pub created_at: DateTime<Utc>,
    pub run_at: DateTime<Utc>,
    pub timezone: String,
    pub status: PostStatus,
}

/// A user's stored schedule plus the reserved next slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    pub user_id: String,
    #[serde(flatten)]
    pub spec: ScheduleSpec,
    pub next_run_at: DateTime<Utc>,
}

/// Fixed-width RFC 3339 UTC (`...Z`), so SQL text comparison on stored
/// instants matches chronological order.
pub(crate) fn fmt_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad instant '{raw}': {e}")))
}
