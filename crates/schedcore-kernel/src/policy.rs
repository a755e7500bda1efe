//! Schedule policy state machine: the pure math of "given the current time,
//! when does this schedule fire next".
//!
//! Rather than a small type hierarchy per variant, this follows a single
//! `Policy` struct carrying every field any variant might need, dispatching
//! on `kind` only where the variants actually differ: which anchor
//! (`base_anchor`) the recurrence is measured from. Everything else —
//! slip recovery, end-bound reschedule checks, finish-time bookkeeping — is
//! shared code. Nothing here talks to a clock, a queue, or an activity;
//! it's pure enough to unit-test without a runtime.

use crate::error::{SchedCoreError, SchedCoreResult};

/// Sentinel `start` value meaning "no explicit start was given". Only
/// meaningful for smart-aligned [`PolicyKind::Interval`] schedules, where
/// it disables the start-anchored branch of slip recovery. Unlike the
/// `UNBOUNDED`/`NEVER` sentinels this doesn't collide with another role's
/// value, so it stays a plain `i64` constant rather than becoming an
/// `Option`.
pub const DAY_ONE: i64 = 86_400;

/// The four schedule policy variants the scheduling core supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Fires exactly once, at `start`. Never reschedules.
    Once,

    /// Fires on a grid aligned to a process-wide smart base, every
    /// `interval` seconds. Aligning many schedules to the same base spreads
    /// otherwise-simultaneous periodic activity across the grid instead of
    /// letting every schedule fire on the same wall-clock second. Forbids
    /// an explicit `start`/`end` at construction time.
    Interval,

    /// Fires on a fixed-rate grid anchored at the caller's explicit
    /// `start`, every `interval` seconds.
    PreciseInterval,

    /// Fires `interval` seconds after the *previous* run finished (or
    /// after `start`, before the first run).
    RelativeInterval,
}

impl PolicyKind {
    /// Whether the scheduler should re-arm this policy after it fires.
    pub fn reschedules(&self) -> bool {
        !matches!(self, PolicyKind::Once)
    }
}

/// Drift recorded the last time slip recovery fired: how far past one
/// interval the missed tick had drifted. Zero when the most recent
/// `calc_next_start_time` call didn't need to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissedTickSlip {
    pub seconds: i64,
}

/// A schedule policy: one of the four [`PolicyKind`]s plus the state it
/// accumulates between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    kind: PolicyKind,
    start: i64,
    interval: Option<u32>,
    end: Option<i64>,
    skip: bool,
    smart_base: i64,
    last_finished: Option<i64>,
    next_start: Option<i64>,
    slip: MissedTickSlip,
}

impl Policy {
    /// A one-shot policy firing at `start`.
    pub fn once(start: i64) -> Self {
        Self {
            kind: PolicyKind::Once,
            start,
            interval: None,
            end: None,
            skip: false,
            smart_base: 0,
            last_finished: None,
            next_start: None,
            slip: MissedTickSlip::default(),
        }
    }

    /// A smart-aligned recurring policy. `smart_base` is usually 0 here and
    /// overwritten with the owning scheduler's process-wide base via
    /// [`Policy::set_smart_base`] before the first
    /// [`Policy::calc_next_start_time`] call.
    pub fn interval(
        start: i64,
        interval_secs: u32,
        end: Option<i64>,
        skip: bool,
        smart_base: i64,
    ) -> SchedCoreResult<Self> {
        Self::new_interval(PolicyKind::Interval, start, interval_secs, end, skip, smart_base)
    }

    /// A fixed-rate policy anchored at the explicit `start`.
    pub fn precise_interval(
        start: i64,
        interval_secs: u32,
        end: Option<i64>,
        skip: bool,
    ) -> SchedCoreResult<Self> {
        Self::new_interval(PolicyKind::PreciseInterval, start, interval_secs, end, skip, 0)
    }

    /// A policy anchored at the previous run's finish time (or `start`,
    /// before the first run).
    pub fn relative_interval(
        start: i64,
        interval_secs: u32,
        end: Option<i64>,
        skip: bool,
    ) -> SchedCoreResult<Self> {
        Self::new_interval(PolicyKind::RelativeInterval, start, interval_secs, end, skip, 0)
    }

    fn new_interval(
        kind: PolicyKind,
        start: i64,
        interval_secs: u32,
        end: Option<i64>,
        skip: bool,
        smart_base: i64,
    ) -> SchedCoreResult<Self> {
        if interval_secs == 0 {
            return Err(SchedCoreError::InvalidCombination(
                "interval_secs must be non-zero",
            ));
        }
        Ok(Self {
            kind,
            start,
            interval: Some(interval_secs),
            end,
            skip,
            smart_base,
            last_finished: None,
            next_start: None,
            slip: MissedTickSlip::default(),
        })
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    /// The configured interval in seconds, or `None` for [`PolicyKind::Once`].
    pub fn interval_secs(&self) -> Option<u32> {
        self.interval
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn end(&self) -> Option<i64> {
        self.end
    }

    /// The cached result of the last [`Policy::calc_next_start_time`] call,
    /// or `None` if it has never been called.
    pub fn next_start(&self) -> Option<i64> {
        self.next_start
    }

    pub fn last_finished(&self) -> Option<i64> {
        self.last_finished
    }

    pub fn slip(&self) -> MissedTickSlip {
        self.slip
    }

    /// Overwrite the smart-alignment anchor. Meaningful only for
    /// [`PolicyKind::Interval`]; a harmless no-op for other kinds.
    pub fn set_smart_base(&mut self, smart_base: i64) {
        self.smart_base = smart_base;
    }

    /// Seed `lastFinished` from a persisted or caller-supplied value,
    /// rejecting a value at or after `now`, or at or before `start`.
    pub fn seed_last_finished(&mut self, value: i64, now: i64) -> SchedCoreResult<()> {
        if value >= now {
            return Err(SchedCoreError::InvalidCombination(
                "lastFinished cannot be in the future",
            ));
        }
        if value <= self.start {
            return Err(SchedCoreError::InvalidCombination(
                "lastFinished cannot be before start",
            ));
        }
        self.last_finished = Some(value);
        Ok(())
    }

    fn base_anchor(&self) -> i64 {
        match self.kind {
            PolicyKind::Once => self.start,
            PolicyKind::Interval => self.smart_base,
            PolicyKind::PreciseInterval => self.start,
            PolicyKind::RelativeInterval => self.last_finished.unwrap_or(self.start),
        }
    }

    /// Whether the scheduler should re-arm this policy after it fires.
    /// Reads `next_start` as of the tick that just fired — call this
    /// *before* the next [`Policy::calc_next_start_time`] call.
    pub fn should_reschedule(&self) -> bool {
        if !self.kind.reschedules() {
            return false;
        }
        let interval = self.interval.unwrap_or(0) as i64;
        match self.end {
            None => true,
            Some(end) => {
                let next = self.next_start.unwrap_or(self.start);
                // Signed on purpose: a cast to unsigned here would make a
                // negative (already-past-end) difference wrap around to a
                // huge positive one and spuriously reschedule.
                (end - next) > interval
            }
        }
    }

    /// Record that the activity bound to this schedule finished at `now`.
    /// Only [`PolicyKind::RelativeInterval`] uses `last_finished` as its
    /// anchor, but every interval kind records it for diagnostics; `Once`
    /// ignores the call.
    pub fn inform_activity_finished(&mut self, now: i64) {
        if matches!(self.kind, PolicyKind::Once) {
            return;
        }
        if now > self.start {
            self.last_finished = Some(now);
        }
    }

    /// Compute the next fire time given the current time, updating and
    /// returning the internal state.
    pub fn calc_next_start_time(&mut self, now: i64) -> SchedCoreResult<i64> {
        let next = match self.kind {
            PolicyKind::Once => self.start,
            _ => {
                let interval = self.interval.ok_or(SchedCoreError::InvalidCombination(
                    "interval policy missing an interval",
                ))? as i64;
                let base = self.base_anchor();

                // Always the first tick strictly after `now`, even when
                // `now` lands exactly on a grid line: floor-divide the
                // elapsed time, then step one period further rather than
                // rounding up only on a nonzero remainder. A plain ceil
                // would hand back `now` itself on an exact multiple,
                // which would immediately re-fire on the next recompute.
                let mut next = if now > base {
                    let elapsed = now - base;
                    let periods = elapsed / interval;
                    base + (periods + 1) * interval
                } else {
                    base
                };

                self.slip = MissedTickSlip::default();
                if !self.skip {
                    let (slipped, reference) = match self.last_finished {
                        None => (
                            self.start != DAY_ONE && (next - self.start) > interval,
                            self.start,
                        ),
                        Some(last_finished) => ((next - last_finished) > interval, last_finished),
                    };
                    if slipped {
                        self.slip = MissedTickSlip {
                            seconds: next - reference,
                        };
                        next = now;
                    }
                }
                next
            }
        };

        self.next_start = Some(next);
        Ok(next)
    }
}
