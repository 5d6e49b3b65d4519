//! Error types for schedule validation.

use thiserror::Error;

/// Errors produced while validating an [`UpdateScheduleRequest`].
///
/// These always name the offending field — a malformed client request is
/// rejected outright, never silently defaulted. Arithmetic inside the
/// resolver deliberately does not surface here: a broken slot computation
/// recovers to a fallback slot instead of failing the whole schedule.
///
/// [`UpdateScheduleRequest`]: crate::spec::UpdateScheduleRequest
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl ScheduleError {
    /// The request field this error is about.
    pub fn field(&self) -> &'static str {
        match self {
            ScheduleError::MissingField(field) => field,
            ScheduleError::InvalidField { field, .. } => field,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
