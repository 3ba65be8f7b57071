//! Cancellable poll loop shared by the task and batch pollers.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::cancel::CancelHandle;
use super::config::PollingConfig;
use super::state::{CheckResult, PollOutcome, PollState, StatusCheck};

/// When the next check runs relative to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Wait one interval after each answer before asking again.
    Sequential,
    /// Tick at a fixed rate; a slow answer delays the next tick instead of
    /// stacking requests.
    FixedRate,
}

/// Runs a [`StatusCheck`] until it is terminal, fails or is cancelled.
///
/// The first check runs immediately in both schedules.
#[derive(Debug, Clone)]
pub struct PollDriver {
    interval: Duration,
    schedule: Schedule,
    max_transient_retries: u32,
    cancel: CancelHandle,
}

impl PollDriver {
    pub fn new(config: &PollingConfig, schedule: Schedule) -> Self {
        Self {
            interval: config.interval(),
            schedule,
            max_transient_retries: config.max_transient_retries,
            cancel: CancelHandle::new(),
        }
    }

    /// Use an existing cancellation handle, typically one owned by a session.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Drive `check` to a terminal outcome.
    pub async fn run<C: StatusCheck>(&self, check: &mut C) -> PollOutcome<C::Output> {
        let subject = check.subject();
        // interval() panics on a zero period.
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut transient_failures = 0u32;
        let mut first = true;

        debug!("Polling {} ({:?}, every {:?})", subject, self.schedule, self.interval);

        loop {
            if !first {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return self.cancelled(&subject),
                    _ = self.wait(&mut ticker) => {}
                }
            } else if self.schedule == Schedule::FixedRate {
                // Consume the immediate first tick so the next one is a full
                // interval away.
                ticker.tick().await;
            }
            first = false;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(&subject),
                result = check.check() => result,
            };

            match result {
                Ok(CheckResult::Pending) => {
                    transient_failures = 0;
                }
                Ok(CheckResult::Done(value)) => {
                    info!("Polling {} {}", subject, PollState::Succeeded.as_str());
                    return PollOutcome::Succeeded(value);
                }
                Err(e) if e.is_retryable() && transient_failures < self.max_transient_retries => {
                    transient_failures += 1;
                    warn!(
                        "Transient error polling {} ({}/{}): {}",
                        subject, transient_failures, self.max_transient_retries, e
                    );
                }
                Err(e) => {
                    warn!("Polling {} {}: {}", subject, PollState::Failed.as_str(), e);
                    return PollOutcome::Failed(e);
                }
            }
        }
    }

    async fn wait(&self, ticker: &mut tokio::time::Interval) {
        match self.schedule {
            Schedule::Sequential => tokio::time::sleep(self.interval).await,
            Schedule::FixedRate => {
                ticker.tick().await;
            }
        }
    }

    fn cancelled<T>(&self, subject: &str) -> PollOutcome<T> {
        info!("Polling {} {}", subject, PollState::Cancelled.as_str());
        PollOutcome::Cancelled
    }
}
