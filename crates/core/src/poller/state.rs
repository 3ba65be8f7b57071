//! Poll state machine types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// State of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// Waiting for a terminal status.
    Polling,
    /// Terminal success.
    Succeeded,
    /// Terminal failure (transport or conversion).
    Failed,
    /// Stopped by the caller.
    Cancelled,
}

impl PollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Polling => "polling",
            PollState::Succeeded => "succeeded",
            PollState::Failed => "failed",
            PollState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Succeeded(T),
    Failed(ClientError),
    Cancelled,
}

impl<T> PollOutcome<T> {
    pub fn state(&self) -> PollState {
        match self {
            PollOutcome::Succeeded(_) => PollState::Succeeded,
            PollOutcome::Failed(_) => PollState::Failed,
            PollOutcome::Cancelled => PollState::Cancelled,
        }
    }

    /// Flatten into a `Result`, mapping cancellation to [`ClientError::Cancelled`].
    pub fn into_result(self) -> Result<T, ClientError> {
        match self {
            PollOutcome::Succeeded(value) => Ok(value),
            PollOutcome::Failed(e) => Err(e),
            PollOutcome::Cancelled => Err(ClientError::Cancelled),
        }
    }
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult<T> {
    /// Not terminal yet; poll again.
    Pending,
    /// Terminal success.
    Done(T),
}

/// One idempotent status query, repeated by the driver until terminal.
#[async_trait]
pub trait StatusCheck: Send {
    type Output: Send;

    /// What is being polled, for logging ("task 42").
    fn subject(&self) -> String;

    /// Query the status once. Errors end the loop unless retryable.
    async fn check(&mut self) -> Result<CheckResult<Self::Output>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_state_terminal() {
        assert!(!PollState::Polling.is_terminal());
        assert!(PollState::Succeeded.is_terminal());
        assert!(PollState::Failed.is_terminal());
        assert!(PollState::Cancelled.is_terminal());
    }

    #[test]
    fn test_outcome_into_result() {
        let ok: PollOutcome<u32> = PollOutcome::Succeeded(7);
        assert_eq!(ok.state(), PollState::Succeeded);
        assert_eq!(ok.into_result().unwrap(), 7);

        let cancelled: PollOutcome<u32> = PollOutcome::Cancelled;
        assert_eq!(cancelled.state(), PollState::Cancelled);
        assert!(matches!(cancelled.into_result(), Err(ClientError::Cancelled)));

        let failed: PollOutcome<u32> = PollOutcome::Failed(ClientError::conversion("t", "x"));
        assert_eq!(failed.state(), PollState::Failed);
    }
}
