//! Error type for the scheduler actor and its handle.

use schedcore_kernel::SchedCoreError;
use thiserror::Error;

/// Errors a [`crate::handle::SchedulerHandle`] call can return.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Validation or policy-math failure from the kernel crate.
    #[error(transparent)]
    Kernel(#[from] SchedCoreError),

    /// The actor task has shut down; no command can be delivered.
    #[error("scheduler actor is no longer running")]
    ActorGone,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RuntimeError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RuntimeError::ActorGone
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for RuntimeError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        RuntimeError::ActorGone
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
