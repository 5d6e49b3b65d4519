//! # cadence-engine
//!
//! Pure recurring-schedule computation for the Cadence post scheduler.
//!
//! The engine turns a frequency / time-of-day / timezone specification into
//! concrete UTC instants, and re-sequences an entire backlog of pending posts
//! onto consecutive future slots. All functions take explicit inputs (no
//! system clock access) — the caller provides the "now" anchor, keeping the
//! computation deterministic and testable with fixed clocks.
//!
//! ## Modules
//!
//! - [`timeofday`] — fail-open `"HH:MM"` parsing with a documented default
//! - [`spec`] — schedule specification, request validation, result types
//! - [`resolve`] — offset-th occurrence of a recurring slot as a UTC instant
//! - [`reconcile`] — assign every pending post its slot after a schedule edit
//! - [`error`] — validation error types

pub mod error;
pub mod reconcile;
pub mod resolve;
pub mod spec;
pub mod timeofday;

pub use error::ScheduleError;
pub use reconcile::{reconcile, BacklogEntry, ReconcileOutcome, SlotAssignment};
pub use resolve::resolve;
pub use spec::{Frequency, ScheduleSpec, UpdateScheduleRequest, UpdateScheduleResult};
pub use timeofday::TimeOfDay;
