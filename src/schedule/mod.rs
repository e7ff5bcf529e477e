//! Pacing between poll passes

mod backoff;

pub use backoff::{Backoff, ExponentialBackoff, ExponentialBackoffBuilder, FixedBackoff};

use std::time::Duration;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, warn};

/// How long the poll loop waits after each pass
#[derive(Debug, Clone, PartialEq)]
pub enum PollSchedule {
    /// Wait the same interval after every pass
    Fixed(Duration),
    /// Back off exponentially while passes keep coming back empty
    BackoffOnEmpty { initial: Duration, max: Duration },
}

impl Default for PollSchedule {
    fn default() -> Self {
        PollSchedule::Fixed(Duration::from_millis(200))
    }
}

impl PollSchedule {
    fn backoff(&self) -> Box<dyn Backoff> {
        match self {
            PollSchedule::Fixed(delay) => Box::new(FixedBackoff::new(*delay)),
            PollSchedule::BackoffOnEmpty { initial, max } => Box::new(
                ExponentialBackoff::builder()
                    .initial_delay(*initial)
                    .max_delay(*max)
                    .build(),
            ),
        }
    }
}

/// Outcome of waiting between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full delay elapsed
    Elapsed,
    /// Shutdown was requested while waiting
    Shutdown,
    /// The shutdown channel went away; nothing can request shutdown any more
    Interrupted,
}

/// Tracks idle passes and turns them into delays
pub struct PollScheduler {
    backoff: Box<dyn Backoff>,
    idle_passes: u32,
    shutdown_closed: bool,
}

impl PollScheduler {
    pub fn new(schedule: &PollSchedule) -> Self {
        Self {
            backoff: schedule.backoff(),
            idle_passes: 0,
            shutdown_closed: false,
        }
    }

    /// Delay to use after a pass that produced `records` records
    pub fn next_delay(&mut self, records: usize) -> Duration {
        if records > 0 {
            self.idle_passes = 0;
        }
        let delay = self.backoff.next_delay(self.idle_passes);
        if records == 0 {
            self.idle_passes = self.idle_passes.saturating_add(1);
        }
        delay
    }

    pub fn idle_passes(&self) -> u32 {
        self.idle_passes
    }

    /// Sleep for `delay` unless shutdown is requested first
    ///
    /// Updates that leave the shutdown flag false do not cut the delay short.
    pub async fn wait(
        &mut self,
        delay: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> WaitOutcome {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        if self.shutdown_closed {
            sleep.await;
            return WaitOutcome::Elapsed;
        }

        loop {
            select! {
                _ = &mut sleep => return WaitOutcome::Elapsed,
                changed = shutdown.changed() => match changed {
                    Ok(()) if *shutdown.borrow() => {
                        debug!("Wait interrupted by shutdown signal");
                        return WaitOutcome::Shutdown;
                    }
                    Ok(()) => continue,
                    Err(e) => {
                        warn!(error = %e, "Sleep interrupted, shutdown channel closed");
                        self.shutdown_closed = true;
                        (&mut sleep).await;
                        return WaitOutcome::Interrupted;
                    }
                },
            }
        }
    }
}
