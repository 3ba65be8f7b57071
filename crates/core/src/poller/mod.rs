//! Status polling for conversion tasks and batch jobs.
//!
//! Both flows share one [`PollDriver`], an explicit state machine
//! (`polling` -> `succeeded` | `failed` | `cancelled`) around a cancellable timer:
//! - **Task**: sequential schedule, next poll only after the previous answer.
//! - **Batch**: fixed-rate schedule, first tick immediate, reconciling items
//!   on every answer.

mod batch;
mod cancel;
mod config;
mod driver;
mod state;
mod task;

pub use batch::{poll_batch, reconcile, BatchCompletion, BatchProgress, Reconciliation};
pub use cancel::CancelHandle;
pub use config::PollingConfig;
pub use driver::{PollDriver, Schedule};
pub use state::{CheckResult, PollOutcome, PollState, StatusCheck};
pub use task::{coarse_progress, poll_task, TaskCompletion};

pub(crate) use task::{announce_task_outcome, TaskCheck};
