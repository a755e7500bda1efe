//! The JSON-facing request shape used to create a schedule, and its
//! validation into a [`Policy`].
//!
//! This is the boundary type: it's what a caller serializes over the wire,
//! not what the scheduler stores internally. Validation turns it into a
//! [`ValidatedSchedule`], rejecting field combinations the scheduling core
//! can't represent before anything touches a queue.

use serde::{Deserialize, Serialize};

use crate::error::{SchedCoreError, SchedCoreResult};
use crate::policy::{Policy, PolicyKind, DAY_ONE};
use crate::time_codec;

/// A request to create a schedule.
///
/// `interval` absent means a one-shot schedule firing once at `start`. When
/// `interval` is present: `relative` requires `precise`; and when neither is
/// set (a smart-aligned recurring interval) `start`/`end` must be absent,
/// since alignment is computed against a process-wide base the caller
/// doesn't control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Anchor the recurrence at the literal `start` instant, and allow an
    /// interval outside the smart-aligned allow-list.
    #[serde(default)]
    pub precise: bool,
    /// Anchor each recurrence on the previous run's finish time. Requires
    /// `precise`.
    #[serde(default)]
    pub relative: bool,
    /// Disable slip recovery: a missed tick is rescheduled on the regular
    /// grid instead of firing immediately.
    #[serde(default)]
    pub skip: bool,
    /// Seed `lastFinished` as though the activity had already completed
    /// once at this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_finished: Option<String>,
    /// Whether this schedule's times are local rather than UTC, which
    /// determines which of the scheduler's two pending queues it lives in.
    #[serde(default)]
    pub local: bool,
}

/// The result of validating a [`ScheduleRequest`]: a policy the kernel
/// knows how to drive, plus the fields validation parsed but that the
/// owning scheduler must apply itself (it alone knows `now` and the
/// process-wide smart base).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSchedule {
    pub policy: Policy,
    pub local: bool,
    /// A raw `lastFinished` value that still needs
    /// [`Policy::seed_last_finished`] applied against `now`.
    pub last_finished_seed: Option<i64>,
}

impl ScheduleRequest {
    /// Validate field combinations and parse timestamps/durations into a
    /// [`ValidatedSchedule`].
    pub fn validate(&self) -> SchedCoreResult<ValidatedSchedule> {
        if self.id.is_empty() {
            return Err(SchedCoreError::MissingField("id"));
        }

        match &self.interval {
            None => self.validate_once(),
            Some(raw_interval) => self.validate_interval(raw_interval),
        }
    }

    fn validate_once(&self) -> SchedCoreResult<ValidatedSchedule> {
        if self.precise || self.relative || self.skip || self.end.is_some() || self.last_finished.is_some()
        {
            return Err(SchedCoreError::InvalidCombination(
                "a one-shot schedule accepts only start and local",
            ));
        }
        let start_raw = self
            .start
            .as_deref()
            .ok_or(SchedCoreError::MissingField("start"))?;
        let (start, _) = time_codec::parse_timestamp(start_raw)?;
        Ok(ValidatedSchedule {
            policy: Policy::once(start),
            local: self.local,
            last_finished_seed: None,
        })
    }

    fn validate_interval(&self, raw_interval: &str) -> SchedCoreResult<ValidatedSchedule> {
        if self.relative && !self.precise {
            return Err(SchedCoreError::InvalidCombination(
                "relative requires precise",
            ));
        }
        if !self.precise && (self.start.is_some() || self.end.is_some()) {
            return Err(SchedCoreError::InvalidCombination(
                "a smart-aligned interval forbids an explicit start/end",
            ));
        }

        let smart = !self.precise;
        let interval_secs = time_codec::parse_duration(raw_interval, smart)?;

        let (start, start_is_utc) = match &self.start {
            Some(raw) => {
                let (start, is_utc) = time_codec::parse_timestamp(raw)?;
                (start, Some(is_utc))
            }
            None => (DAY_ONE, None),
        };

        let end = match &self.end {
            None => None,
            Some(raw) => {
                let (end, end_is_utc) = time_codec::parse_timestamp(raw)?;
                if let Some(start_is_utc) = start_is_utc {
                    if end_is_utc != start_is_utc {
                        return Err(SchedCoreError::InconsistentTimeZone);
                    }
                }
                if end <= start {
                    return Err(SchedCoreError::InvalidCombination(
                        "end must be strictly after start",
                    ));
                }
                Some(end)
            }
        };

        let last_finished_seed = match &self.last_finished {
            None => None,
            Some(raw) => Some(time_codec::parse_timestamp(raw)?.0),
        };

        let kind = if self.relative {
            PolicyKind::RelativeInterval
        } else if self.precise {
            PolicyKind::PreciseInterval
        } else {
            PolicyKind::Interval
        };

        let policy = match kind {
            PolicyKind::Interval => Policy::interval(start, interval_secs, end, self.skip, 0)?,
            PolicyKind::PreciseInterval => {
                Policy::precise_interval(start, interval_secs, end, self.skip)?
            }
            PolicyKind::RelativeInterval => {
                Policy::relative_interval(start, interval_secs, end, self.skip)?
            }
            PolicyKind::Once => unreachable!("interval branch never yields Once"),
        };

        Ok(ValidatedSchedule {
            policy,
            local: self.local,
            last_finished_seed,
        })
    }
}
