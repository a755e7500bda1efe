//! The scheduler runtime: the actor that drives [`schedcore_kernel`]'s pure
//! scheduling types against a real clock and a real timer.
//!
//! Per the workspace's microkernel split:
//!
//! - `schedcore-kernel` owns the types — policies, the time codec, request
//!   validation — none of which touch a runtime.
//! - `schedcore` (this crate) owns the actor: one task, two ordered queues,
//!   one programmed wake-up, driven over a channel so nothing outside this
//!   crate ever locks scheduler state directly.

pub mod activity;
pub mod arena;
pub mod config;
pub mod error;
pub mod handle;
pub mod queue;
pub mod scheduler;
pub mod timeout_driver;

pub use activity::{ActivityCallback, ChannelCallback, FireEvent, LoggingCallback};
pub use config::{load_scheduler_config, SchedulerConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use handle::SchedulerHandle;
pub use scheduler::{Scheduler, ScheduleSnapshot};
pub use timeout_driver::{TimeoutDriver, TokioTimeoutDriver};

// Re-export the kernel crate's types callers need to build requests without
// an extra `Cargo.toml` entry.
pub use schedcore_kernel::{
    clock, Clock, MissedTickSlip, Policy, PolicyKind, ScheduleRequest, SchedCoreError,
    SchedCoreResult, SystemClock, DAY_ONE,
};
