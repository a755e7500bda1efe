//! The single programmed wake-up timer the scheduler actor waits on.
//!
//! The scheduler never arms more than one timeout at a time: each pass
//! through the actor loop recomputes the single nearest deadline across
//! both queues and asks the driver to wait for exactly that instant (or
//! forever, if nothing is pending). Abstracting it behind a trait lets
//! tests drive the actor with [`tokio::time::pause`]/`advance` instead of
//! sleeping in real time.

use std::sync::Arc;

use async_trait::async_trait;
use schedcore_kernel::Clock;

/// Waits until an epoch-second deadline (or forever, for `None`).
#[async_trait]
pub trait TimeoutDriver: Send + Sync {
    async fn sleep_until(&self, deadline_epoch_secs: Option<i64>);
}

/// The production [`TimeoutDriver`], backed by `tokio::time::sleep` and an
/// injected [`Clock`] so the deadline-to-duration conversion goes through
/// the same time source as the rest of the scheduler.
pub struct TokioTimeoutDriver {
    clock: Arc<dyn Clock>,
}

impl TokioTimeoutDriver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl TimeoutDriver for TokioTimeoutDriver {
    async fn sleep_until(&self, deadline_epoch_secs: Option<i64>) {
        match deadline_epoch_secs {
            None => std::future::pending::<()>().await,
            Some(deadline) => {
                let now = self.clock.now();
                let delta_secs = (deadline - now).max(0) as u64;
                tokio::time::sleep(std::time::Duration::from_secs(delta_secs)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedcore_kernel::clock::TestClock;

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_exact_remaining_duration() {
        let clock = Arc::new(TestClock::at(1_000));
        let driver = TokioTimeoutDriver::new(clock);

        let start = tokio::time::Instant::now();
        driver.sleep_until(Some(1_010)).await;
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_resolves_immediately() {
        let clock = Arc::new(TestClock::at(2_000));
        let driver = TokioTimeoutDriver::new(clock);

        let start = tokio::time::Instant::now();
        driver.sleep_until(Some(1_000)).await;
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(0));
    }

    #[tokio::test]
    async fn none_never_races_a_real_timer() {
        let clock = Arc::new(TestClock::at(0));
        let driver = TokioTimeoutDriver::new(clock);

        tokio::select! {
            _ = driver.sleep_until(None) => panic!("None deadline must never resolve"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(5)) => {}
        }
    }
}
