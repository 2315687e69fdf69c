//! Fixed-cadence status polling.
//!
//! Ticks are strictly sequential: the next tick is scheduled only after the
//! previous one has fully resolved and its result has been applied, so status
//! responses can never be applied out of order. Cancellation is cooperative;
//! aborting the owning task stops the loop at its next await point and no
//! further tick is scheduled.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Job still in progress; schedule the next tick.
    Continue,
    /// Terminal state applied; stop polling.
    Stop,
}

/// Why the scheduler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A tick reported a terminal outcome.
    Stopped,
    /// The configured tick budget ran out before any tick reported one.
    Exhausted { ticks: u32 },
}

/// Drives a status-check callback on a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct PollScheduler {
    interval: Duration,
    max_ticks: Option<u32>,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_ticks: None,
        }
    }
}

impl PollScheduler {
    pub fn new(interval: Duration, max_ticks: Option<u32>) -> Self {
        Self {
            interval,
            max_ticks,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `tick` until it reports [`TickOutcome::Stop`] or the tick budget
    /// is exhausted. The first tick fires immediately; the interval separates
    /// a tick's completion from the next tick's start.
    pub async fn run<F, Fut>(&self, mut tick: F) -> PollOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = TickOutcome>,
    {
        let mut ticks = 0u32;
        loop {
            if let Some(max) = self.max_ticks {
                if ticks >= max {
                    return PollOutcome::Exhausted { ticks };
                }
            }
            ticks += 1;
            if tick(ticks).await == TickOutcome::Stop {
                return PollOutcome::Stopped;
            }
            sleep(self.interval).await;
        }
    }
}
