//! The public, cloneable API surface over a running scheduler actor.
//!
//! Every call is a message over a bounded channel plus a oneshot reply —
//! the actor itself never exposes its state directly, so there's no lock
//! for callers to contend on and no way to observe it mid-reprogram-pass.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use schedcore_kernel::ScheduleRequest;

use crate::activity::ActivityCallback;
use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::ScheduleSnapshot;

// Re-import the private Command enum's constructors through the scheduler
// module's internal API. `Command` itself stays private to `scheduler`; the
// handle only ever builds one indirectly via the methods below.
use crate::scheduler::Command;

/// A cheap-to-clone handle to a running scheduler actor.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<Command>) -> Self {
        Self { cmd_tx }
    }

    async fn call<T>(
        &self,
        make_cmd: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> RuntimeResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make_cmd(reply_tx))
            .await
            .map_err(|_| RuntimeError::ActorGone)?;
        reply_rx.await.map_err(|_| RuntimeError::ActorGone)
    }

    /// Register a new schedule, delivering fire notifications to `callback`.
    pub async fn register(
        &self,
        request: ScheduleRequest,
        callback: Arc<dyn ActivityCallback>,
    ) -> RuntimeResult<()> {
        self.call(|reply| Command::Register {
            request,
            callback,
            reply,
        })
        .await?
    }

    /// Remove a schedule. No further fires are dispatched for it.
    pub async fn unregister(&self, id: impl Into<String>) -> RuntimeResult<()> {
        let id = id.into();
        self.call(|reply| Command::Unregister { id, reply }).await?
    }

    /// Suspend dispatch for a schedule without losing its place in the
    /// grid: a paused periodic schedule keeps computing (and skipping) its
    /// ticks so resuming doesn't produce a burst of catch-up fires.
    pub async fn pause(&self, id: impl Into<String>) -> RuntimeResult<()> {
        let id = id.into();
        self.call(|reply| Command::Pause { id, reply }).await?
    }

    /// Resume a previously paused schedule.
    pub async fn resume(&self, id: impl Into<String>) -> RuntimeResult<()> {
        let id = id.into();
        self.call(|reply| Command::Resume { id, reply }).await?
    }

    /// Tell the scheduler an activity bound to `id` finished at
    /// `finished_at`. Only [`schedcore_kernel::PolicyKind::RelativeInterval`]
    /// schedules use this; calling it for other kinds is harmless.
    pub async fn notify_finished(&self, id: impl Into<String>, finished_at: i64) -> RuntimeResult<()> {
        let id = id.into();
        self.call(|reply| Command::NotifyFinished {
            id,
            finished_at,
            reply,
        })
        .await?
    }

    /// Record (or update) the local/UTC offset in seconds, east-positive.
    /// The first call lifts the local-time queue's quarantine; later calls
    /// force an immediate check for now-due local schedules.
    pub async fn set_local_offset(&self, offset: i64) -> RuntimeResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SetLocalOffset {
                offset,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::ActorGone)?;
        reply_rx.await.map_err(|_| RuntimeError::ActorGone)
    }

    /// Tell the scheduler the wall clock jumped (or the timezone changed):
    /// every queued schedule's next fire time is recomputed from scratch.
    pub async fn time_changed(&self) -> RuntimeResult<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::TimeChanged { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::ActorGone)?;
        reply_rx.await.map_err(|_| RuntimeError::ActorGone)
    }

    /// Snapshot every currently registered schedule.
    pub async fn list(&self) -> RuntimeResult<Vec<ScheduleSnapshot>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::List { reply: reply_tx })
            .await
            .map_err(|_| RuntimeError::ActorGone)?;
        reply_rx.await.map_err(|_| RuntimeError::ActorGone)
    }
}
