//! The external handle contract: how the scheduler tells the rest of the
//! world that a schedule fired.
//!
//! The scheduler core only *weakly* references whatever owns a schedule —
//! it never calls into activity logic synchronously and never blocks a
//! reprogram pass on a slow callback. Firing is fire-and-forget: the
//! callback is spawned, the actor moves straight on to rearming the timer.

use async_trait::async_trait;
use tracing::debug;

/// A fire notification: which schedule fired, and at what instant (per the
/// scheduler's own clock, not necessarily wall-clock-exact).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireEvent {
    pub schedule_id: String,
    pub fire_time: i64,
}

/// Receives fire notifications for a registered schedule.
///
/// Implementors must not panic. The scheduler spawns each call onto its own
/// task rather than awaiting it inline, so a slow callback never blocks the
/// actor's reprogram pass — but it does mean `on_fire` is racing the rest of
/// the system's view of "finished", so long-running work still belongs on
/// the other side of a channel, which is exactly what [`ChannelCallback`]
/// sets up.
#[async_trait]
pub trait ActivityCallback: Send + Sync {
    async fn on_fire(&self, event: FireEvent);
}

/// Forwards fire events onto an unbounded channel, for callers who want to
/// drain them from elsewhere (a worker pool, a UI, a test harness) instead
/// of running activity logic inline on the scheduler's actor task.
pub struct ChannelCallback {
    sender: tokio::sync::mpsc::UnboundedSender<FireEvent>,
}

impl ChannelCallback {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<FireEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl ActivityCallback for ChannelCallback {
    async fn on_fire(&self, event: FireEvent) {
        if self.sender.send(event).is_err() {
            debug!("fire event dropped: receiver gone");
        }
    }
}

/// Logs fire events at `info` and otherwise does nothing. Useful as a
/// default callback for schedules nobody subscribed to yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallback;

#[async_trait]
impl ActivityCallback for LoggingCallback {
    async fn on_fire(&self, event: FireEvent) {
        tracing::info!(
            schedule_id = %event.schedule_id,
            fire_time = event.fire_time,
            "schedule fired"
        );
    }
}
