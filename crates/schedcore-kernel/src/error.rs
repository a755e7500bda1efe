//! Crate-level error type for `schedcore-kernel`.
//!
//! Every validation failure the time codec and the schedule policies can
//! produce collapses into a single [`SchedCoreError`] so callers at the
//! boundary (building a schedule from a [`crate::request::ScheduleRequest`])
//! have one type to match on.

use thiserror::Error;

/// All errors the kernel crate can return.
///
/// Marked `#[non_exhaustive]` so new variants can be added in a minor release
/// without breaking callers that match exhaustively.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedCoreError {
    /// A duration string was unparseable, or every field in it was zero.
    #[error(
        "invalid duration '{0}': must match (?:\\d+D)?(?:\\d+H)?(?:\\d+M)?(?:\\d+S)? and be non-zero"
    )]
    InvalidDuration(String),

    /// A `smart` duration was well-formed but not in the aligned allow-list.
    #[error(
        "invalid smart interval '{0}': must be a whole number of minutes in \
         {{5,10,15,20,30,60,180,360,720}} or a multiple of 1440"
    )]
    InvalidSmartInterval(String),

    /// A timestamp string was unparseable or had an unexpected trailing
    /// character after `HH:MM:SS`.
    #[error("invalid time '{0}': expected 'YYYY-MM-DD HH:MM:SS' with an optional trailing 'Z'")]
    InvalidTime(String),

    /// `start` and `end` disagreed on whether they are UTC.
    #[error("start and end disagree on UTC-ness")]
    InconsistentTimeZone,

    /// A required field was missing from a schedule request.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// An internally-inconsistent combination of schedule fields was given.
    #[error("invalid combination: {0}")]
    InvalidCombination(&'static str),

    /// Raised internally when the next start time is requested before one
    /// has ever been computed. Callers that drive `Idle -> Queued` through
    /// [`crate::policy::Policy::calc_next_start_time`] never observe it.
    #[error("next start time requested before the schedule was queued")]
    QueueEmpty,

    /// A management call referenced a schedule id that isn't registered.
    #[error("schedule '{0}' not found")]
    NotFound(String),

    /// A registration call reused a schedule id that's already active.
    #[error("schedule '{0}' already exists")]
    AlreadyExists(String),
}

/// Convenience alias used throughout the kernel crate.
pub type SchedCoreResult<T> = Result<T, SchedCoreError>;
