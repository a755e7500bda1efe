//! The scheduler actor: one task, two ordered queues, one programmed timer.
//!
//! Every registered schedule lives in exactly one of two places — the
//! UTC-absolute queue (`abs_q`) or the local-time queue (`loc_q`) — keyed by
//! its next fire time. Each pass through the loop looks at both queue heads,
//! asks the [`TimeoutDriver`] to wait for the earlier one (or for the next
//! command, whichever comes first), and on wake either dispatches whatever
//! fired or handles the command that arrived. There is never more than one
//! timer armed at a time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use schedcore_kernel::time_codec::{format_duration, format_timestamp};
use schedcore_kernel::{Clock, PolicyKind, ScheduleRequest, SchedCoreError, DAY_ONE};

use crate::activity::{ActivityCallback, FireEvent};
use crate::arena::{Arena, Key};
use crate::error::{RuntimeError, RuntimeResult};
use crate::queue::TimeQueue;

/// Where a schedule lives in the actor's bookkeeping: queued-and-waiting, or
/// dispatched-and-waiting-for-completion. A schedule only leaves `Fired` via
/// `NotifyFinished` (or, for a paused tick, immediately back to `Scheduled`
/// since no activity ever actually ran to report completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Scheduled,
    Fired,
}

struct ScheduleSlot {
    id: String,
    policy: schedcore_kernel::Policy,
    local: bool,
    paused: bool,
    state: ItemState,
    /// The fire time of the tick currently awaiting `NotifyFinished`, so the
    /// eventual reschedule can be floored past it the same way a paused
    /// tick's immediate reschedule already is (see `dispatch`).
    pending_fire_time: Option<i64>,
    callback: Arc<dyn ActivityCallback>,
}

/// A point-in-time snapshot returned by [`Command::List`], doubling as the
/// schedule-introspection JSON representation.
#[derive(Debug, Clone)]
pub struct ScheduleSnapshot {
    pub id: String,
    pub kind: PolicyKind,
    pub scheduled: bool,
    pub paused: bool,
    pub local: bool,
    pub start: i64,
    pub interval_secs: Option<u32>,
    pub end: Option<i64>,
    pub skip: bool,
    pub last_finished: Option<i64>,
    pub next_start: Option<i64>,
}

impl ScheduleSnapshot {
    /// The per-variant JSON shape the original `Schedule::ToJson` /
    /// `IntervalSchedule::ToJson` / `PreciseIntervalSchedule::ToJson` /
    /// `RelativeIntervalSchedule::ToJson` chain emits, flattened into one
    /// function dispatching on `kind`.
    pub fn to_json(&self) -> serde_json::Value {
        let is_utc = !self.local;
        let mut map = serde_json::Map::new();

        map.insert("scheduled".into(), self.scheduled.into());
        if self.local {
            map.insert("local".into(), true.into());
        }
        if self.start != DAY_ONE {
            map.insert(
                "start".into(),
                format_timestamp(self.start, is_utc).into(),
            );
        }

        if !matches!(self.kind, PolicyKind::Once) {
            // `interval_secs` is always `Some` for a non-Once policy.
            if let Some(interval_secs) = self.interval_secs {
                map.insert("interval".into(), format_duration(interval_secs).into());
            }
            if let Some(end) = self.end {
                map.insert("end".into(), format_timestamp(end, is_utc).into());
            }
            if self.skip {
                map.insert("skip".into(), true.into());
            }
            if let Some(last_finished) = self.last_finished {
                map.insert(
                    "lastFinished".into(),
                    format_timestamp(last_finished, is_utc).into(),
                );
            }
            if let Some(next_start) = self.next_start {
                map.insert(
                    "nextStart".into(),
                    format_timestamp(next_start, is_utc).into(),
                );
            }
        }

        match self.kind {
            PolicyKind::PreciseInterval => {
                map.insert("precise".into(), true.into());
            }
            PolicyKind::RelativeInterval => {
                map.insert("precise".into(), true.into());
                map.insert("relative".into(), true.into());
            }
            PolicyKind::Once | PolicyKind::Interval => {}
        }

        serde_json::Value::Object(map)
    }
}

pub(crate) enum Command {
    Register {
        request: ScheduleRequest,
        callback: Arc<dyn ActivityCallback>,
        reply: oneshot::Sender<RuntimeResult<()>>,
    },
    Unregister {
        id: String,
        reply: oneshot::Sender<RuntimeResult<()>>,
    },
    Pause {
        id: String,
        reply: oneshot::Sender<RuntimeResult<()>>,
    },
    Resume {
        id: String,
        reply: oneshot::Sender<RuntimeResult<()>>,
    },
    NotifyFinished {
        id: String,
        finished_at: i64,
        reply: oneshot::Sender<RuntimeResult<()>>,
    },
    /// Record (or update) the local/UTC offset in seconds, east-positive.
    /// The first call lifts `loc_q`'s quarantine.
    SetLocalOffset {
        offset: i64,
        reply: oneshot::Sender<()>,
    },
    /// The wall clock jumped, or the timezone changed: recompute every
    /// queued schedule's next fire time from scratch.
    TimeChanged {
        reply: oneshot::Sender<()>,
    },
    List {
        reply: oneshot::Sender<Vec<ScheduleSnapshot>>,
    },
}

/// 23h plus a random 0..6h offset, per schedule registration's smart-base
/// range. Kept separate from [`Scheduler::TEST_SMART_BASE`] so production
/// behavior spreads aligned schedules across the grid while tests stay
/// deterministic.
fn generate_smart_base() -> i64 {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    23 * 3600 + rng.gen_range(0..6 * 3600)
}

/// The owning side of the actor: constructed once, then [`Scheduler::run`]
/// consumes it on its own task. Callers interact with it exclusively
/// through the [`crate::handle::SchedulerHandle`] it hands back from
/// [`Scheduler::spawn`].
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    timeout_driver: Arc<dyn crate::timeout_driver::TimeoutDriver>,
    smart_base: i64,
    arena: Arena<ScheduleSlot>,
    by_id: HashMap<String, Key>,
    abs_q: TimeQueue,
    loc_q: TimeQueue,
    /// `None` while `loc_q` is quarantined (no `SetLocalOffset` call yet):
    /// local-time schedules are accepted and ordered, but never drained.
    local_offset: Option<i64>,
    /// How long a fired callback may run before it's logged as stuck.
    fire_callback_timeout_secs: u64,
    cmd_rx: mpsc::Receiver<Command>,
}

impl Scheduler {
    /// Fixed smart base used by tests in place of [`generate_smart_base`],
    /// so alignment math is reproducible.
    pub const TEST_SMART_BASE: i64 = 25 * 3600;

    /// Build and spawn the actor with a randomized smart base and the
    /// default [`SchedulerConfig`], returning a cloneable
    /// [`crate::handle::SchedulerHandle`] for talking to it.
    pub fn spawn(
        clock: Arc<dyn Clock>,
        timeout_driver: Arc<dyn crate::timeout_driver::TimeoutDriver>,
    ) -> crate::handle::SchedulerHandle {
        Self::spawn_with_config(
            clock,
            timeout_driver,
            generate_smart_base(),
            crate::config::SchedulerConfig::default(),
        )
    }

    /// Like [`Scheduler::spawn`], but with an explicit smart base and the
    /// default [`SchedulerConfig`]. Tests use this with
    /// [`Scheduler::TEST_SMART_BASE`] to get reproducible alignment.
    pub fn spawn_with_smart_base(
        clock: Arc<dyn Clock>,
        timeout_driver: Arc<dyn crate::timeout_driver::TimeoutDriver>,
        smart_base: i64,
    ) -> crate::handle::SchedulerHandle {
        Self::spawn_with_config(
            clock,
            timeout_driver,
            smart_base,
            crate::config::SchedulerConfig::default(),
        )
    }

    /// Build and spawn the actor with an explicit smart base and
    /// [`SchedulerConfig`], sizing the command channel and the
    /// stuck-callback diagnostic from it rather than hardcoded constants.
    pub fn spawn_with_config(
        clock: Arc<dyn Clock>,
        timeout_driver: Arc<dyn crate::timeout_driver::TimeoutDriver>,
        smart_base: i64,
        config: crate::config::SchedulerConfig,
    ) -> crate::handle::SchedulerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity);
        let scheduler = Scheduler {
            clock,
            timeout_driver,
            smart_base,
            arena: Arena::new(),
            by_id: HashMap::new(),
            abs_q: TimeQueue::new(),
            loc_q: TimeQueue::new(),
            local_offset: None,
            fire_callback_timeout_secs: config.fire_callback_timeout_secs,
            cmd_rx,
        };
        tokio::spawn(scheduler.run());
        crate::handle::SchedulerHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        info!("scheduler actor started");
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            debug!("all scheduler handles dropped, shutting down");
                            break;
                        }
                    }
                }
                _ = self.timeout_driver.sleep_until(deadline) => {
                    self.fire_due().await;
                }
            }
        }
    }

    /// The next real (absolute-epoch) instant the timer should fire at, or
    /// `None` if nothing is armable — either both queues are empty, or
    /// `loc_q` is the only non-empty one and still quarantined.
    fn next_deadline(&mut self) -> Option<i64> {
        let arena = &self.arena;
        let is_live = |key: Key| arena.contains(key);
        let abs_head = self.abs_q.peek_min(is_live).map(|(t, _)| t);
        let loc_head = self
            .local_offset
            .and_then(|offset| self.loc_q.peek_min(is_live).map(|(t, _)| t - offset));
        match (abs_head, loc_head) {
            (Some(a), Some(l)) => Some(a.min(l)),
            (Some(a), None) => Some(a),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Register {
                request,
                callback,
                reply,
            } => {
                let result = self.register(request, callback);
                let _ = reply.send(result);
            }
            Command::Unregister { id, reply } => {
                let result = self.unregister(&id);
                let _ = reply.send(result);
            }
            Command::Pause { id, reply } => {
                let result = self.set_paused(&id, true);
                let _ = reply.send(result);
            }
            Command::Resume { id, reply } => {
                let result = self.set_paused(&id, false);
                let _ = reply.send(result);
            }
            Command::NotifyFinished {
                id,
                finished_at,
                reply,
            } => {
                let result = self.notify_finished(&id, finished_at);
                let _ = reply.send(result);
            }
            Command::SetLocalOffset { offset, reply } => {
                self.local_offset = Some(offset);
                // A changed offset can make already-queued local items due
                // under the new conversion; drain immediately instead of
                // waiting for the loop to re-arm.
                self.fire_due().await;
                let _ = reply.send(());
            }
            Command::TimeChanged { reply } => {
                self.handle_time_changed();
                self.fire_due().await;
                let _ = reply.send(());
            }
            Command::List { reply } => {
                let _ = reply.send(self.list());
            }
        }
    }

    fn register(
        &mut self,
        request: ScheduleRequest,
        callback: Arc<dyn ActivityCallback>,
    ) -> RuntimeResult<()> {
        if self.by_id.contains_key(&request.id) {
            return Err(RuntimeError::Kernel(SchedCoreError::AlreadyExists(
                request.id.clone(),
            )));
        }

        let validated = request.validate()?;
        let mut policy = validated.policy;
        if matches!(policy.kind(), PolicyKind::Interval) {
            policy.set_smart_base(self.smart_base);
        }

        let now = self.clock.now();
        if let Some(seed) = validated.last_finished_seed {
            policy.seed_last_finished(seed, now)?;
        }
        let next_start = policy.calc_next_start_time(now)?;

        let id = request.id.clone();
        let local = validated.local;
        let slot = ScheduleSlot {
            id: id.clone(),
            policy,
            local,
            paused: false,
            state: ItemState::Scheduled,
            pending_fire_time: None,
            callback,
        };
        let key = self.arena.insert(slot);
        self.by_id.insert(id, key);

        self.enqueue(key, next_start, local);
        Ok(())
    }

    fn enqueue(&mut self, key: Key, fire_time: i64, local: bool) {
        if local {
            self.loc_q.push(fire_time, key);
        } else {
            self.abs_q.push(fire_time, key);
        }
    }

    fn unregister(&mut self, id: &str) -> RuntimeResult<()> {
        let key = self
            .by_id
            .remove(id)
            .ok_or_else(|| SchedCoreError::NotFound(id.to_string()))?;
        self.arena.remove(key);
        Ok(())
    }

    fn set_paused(&mut self, id: &str, paused: bool) -> RuntimeResult<()> {
        let key = *self
            .by_id
            .get(id)
            .ok_or_else(|| SchedCoreError::NotFound(id.to_string()))?;
        let slot = self
            .arena
            .get_mut(key)
            .expect("by_id and arena must stay in sync");
        slot.paused = paused;
        Ok(())
    }

    /// The `Running -> (Idle | Queued)` transition: the activity the last
    /// dispatch invoked has finished, so this is the first point at which
    /// `lastFinished` reflects the real completion time and the reschedule
    /// decision (and, for `RelativeInterval`, the next tick itself) can be
    /// made. A schedule currently sitting in a queue (never fired, or a
    /// paused tick that already rescheduled itself without running
    /// anything) is left alone — this only fires for a genuinely `Fired`
    /// item, so a stray or duplicate `NotifyFinished` can't double-enqueue
    /// an already-queued key.
    fn notify_finished(&mut self, id: &str, finished_at: i64) -> RuntimeResult<()> {
        let key = *self
            .by_id
            .get(id)
            .ok_or_else(|| SchedCoreError::NotFound(id.to_string()))?;
        let slot = self
            .arena
            .get_mut(key)
            .expect("by_id and arena must stay in sync");
        slot.policy.inform_activity_finished(finished_at);

        if slot.state != ItemState::Fired {
            return Ok(());
        }

        if !slot.policy.should_reschedule() {
            self.by_id.remove(id);
            self.arena.remove(key);
            return Ok(());
        }

        let now = self.clock.now();
        let effective_now = slot.pending_fire_time.map_or(now, |t| now.max(t + 1));
        let local = slot.local;
        let next = match slot.policy.calc_next_start_time(effective_now) {
            Ok(next) => next,
            Err(err) => {
                warn!(schedule_id = %id, error = %err, "failed to compute next fire time, dropping schedule");
                self.by_id.remove(id);
                self.arena.remove(key);
                return Ok(());
            }
        };

        let slot = self
            .arena
            .get_mut(key)
            .expect("slot cannot vanish mid-reschedule");
        slot.state = ItemState::Scheduled;
        slot.pending_fire_time = None;
        self.enqueue(key, next, local);
        Ok(())
    }

    fn list(&self) -> Vec<ScheduleSnapshot> {
        self.arena
            .iter()
            .map(|(_, slot)| ScheduleSnapshot {
                id: slot.id.clone(),
                kind: slot.policy.kind(),
                scheduled: slot.state == ItemState::Fired,
                paused: slot.paused,
                local: slot.local,
                start: slot.policy.start(),
                interval_secs: slot.policy.interval_secs(),
                end: slot.policy.end(),
                skip: slot.policy.skip(),
                last_finished: slot.policy.last_finished(),
                next_start: slot.policy.next_start(),
            })
            .collect()
    }

    /// Pop and dispatch everything due at or before now, from whichever
    /// queue has the earlier head (converting `loc_q`'s head to a real
    /// epoch instant via `local_offset` first), repeating until nothing due
    /// remains. `loc_q` is skipped entirely while quarantined.
    async fn fire_due(&mut self) {
        let now = self.clock.now();
        loop {
            let arena = &self.arena;
            let is_live = |key: Key| arena.contains(key);
            let abs_candidate = self.abs_q.peek_min(is_live).map(|(t, _)| t);
            let loc_candidate = self
                .local_offset
                .and_then(|offset| self.loc_q.peek_min(is_live).map(|(t, _)| t - offset));

            let from_abs = match (abs_candidate, loc_candidate) {
                (Some(a), Some(l)) => a <= l,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            let due = if from_abs {
                abs_candidate.expect("matched Some above") <= now
            } else {
                loc_candidate.expect("matched Some above") <= now
            };

            if !due {
                break;
            }

            let (fire_time, key) = if from_abs {
                self.abs_q.pop_min(is_live).expect("peeked above")
            } else {
                self.loc_q.pop_min(is_live).expect("peeked above")
            };

            self.dispatch(key, fire_time, now).await;
        }
    }

    async fn dispatch(&mut self, key: Key, fire_time: i64, now: i64) {
        let Some(slot) = self.arena.get_mut(key) else {
            return;
        };
        slot.state = ItemState::Fired;
        let id = slot.id.clone();
        let local = slot.local;
        let paused = slot.paused;
        let callback = Arc::clone(&slot.callback);

        if !paused {
            // The real reschedule decision is deferred to `notify_finished`:
            // only then does `last_finished` reflect the run that actually
            // just fired, which `RelativeInterval` depends on. Record the
            // fire time so that handler can still floor its recompute past
            // it the same way this function used to.
            slot.pending_fire_time = Some(fire_time);
            let event = FireEvent {
                schedule_id: id.clone(),
                fire_time,
            };
            let timeout_secs = self.fire_callback_timeout_secs;
            let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
            let done_watcher = Arc::clone(&done);
            let watched_id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(timeout_secs)).await;
                if !done_watcher.load(std::sync::atomic::Ordering::Acquire) {
                    warn!(
                        schedule_id = %watched_id,
                        timeout_secs,
                        "fired callback still running past its diagnostic timeout"
                    );
                }
            });
            tokio::spawn(async move {
                callback.on_fire(event).await;
                done.store(true, std::sync::atomic::Ordering::Release);
            });
            return;
        }

        debug!(schedule_id = %id, "schedule due while paused, skipping dispatch");

        // No activity ever ran, so no `NotifyFinished` will ever arrive for
        // this tick — reschedule immediately, as before.
        let slot = self
            .arena
            .get_mut(key)
            .expect("slot cannot vanish mid-dispatch");

        if !slot.policy.should_reschedule() {
            self.by_id.remove(&id);
            self.arena.remove(key);
            return;
        }

        // The ceil-to-grid formula returns `next == fire_time` exactly when
        // `fire_time` lands precisely on a tick boundary and no time has
        // passed since. Recomputing with plain `now` in that case would
        // hand back the same instant forever. Flooring the clock reading
        // used here to "one second past what just fired" guarantees
        // forward progress without otherwise changing the result: when the
        // real clock has already moved on, `now` is at least `fire_time`,
        // so the `.max` is a no-op.
        let effective_now = now.max(fire_time + 1);
        let next = match slot.policy.calc_next_start_time(effective_now) {
            Ok(next) => next,
            Err(err) => {
                warn!(schedule_id = %id, error = %err, "failed to compute next fire time, dropping schedule");
                self.by_id.remove(&id);
                self.arena.remove(key);
                return;
            }
        };

        slot.state = ItemState::Scheduled;
        self.enqueue(key, next, local);
    }

    /// Recompute every queued schedule's next fire time from the current
    /// clock reading, rebuilding both queues. Mirrors a wall-clock jump or
    /// a timezone change: unlike [`Scheduler::local_offset`], this touches
    /// `abs_q` too, since an absolute clock jump invalidates its ordering
    /// just as much as `loc_q`'s.
    fn handle_time_changed(&mut self) {
        let now = self.clock.now();
        for q in [&mut self.abs_q, &mut self.loc_q] {
            let entries = q.drain_all();
            for (_, key) in entries {
                let Some(slot) = self.arena.get_mut(key) else {
                    continue;
                };
                match slot.policy.calc_next_start_time(now) {
                    Ok(next) => q.push(next, key),
                    Err(err) => {
                        warn!(schedule_id = %slot.id, error = %err, "dropping schedule on time change");
                        let id = slot.id.clone();
                        self.by_id.remove(&id);
                        self.arena.remove(key);
                    }
                }
            }
        }
    }
}
