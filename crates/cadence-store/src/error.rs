//! Error types for store operations.

use thiserror::Error;

use cadence_engine::ScheduleError;

/// Errors that can occur while persisting schedules and posts.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The request itself is malformed; names the offending field.
    /// Nothing was read or written.
    #[error(transparent)]
    Invalid(#[from] ScheduleError),

    /// No schedule settings stored for this user yet.
    #[error("no schedule settings stored for user '{0}'")]
    SettingsNotFound(String),

    /// Post does not exist.
    #[error("post not found: {0}")]
    PostNotFound(String),

    /// Post exists but already left the pending state.
    #[error("post {0} is not pending")]
    PostNotPending(String),

    /// A stored row cannot be interpreted.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Persistence fault. The enclosing transaction rolled back, so the
    /// request is safe to retry verbatim.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
