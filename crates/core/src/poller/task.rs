//! Single-conversion task polling.

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::error::ClientError;
use crate::events::{EventSink, ProgressEvent};
use crate::service::{ConversionService, DownloadRef, ServiceError, TaskStatus};

use super::driver::PollDriver;
use super::state::{CheckResult, PollOutcome, StatusCheck};

const FALLBACK_ERROR: &str = "Conversion failed";

/// A finished single conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    pub output_file_name: String,
    pub download: DownloadRef,
}

/// Coarse progress hint for a non-terminal status.
///
/// The service reports no real progress, so `processing` maps to a random
/// value in 60..90 and every other status to nothing.
pub fn coarse_progress(status: TaskStatus) -> Option<u8> {
    match status {
        TaskStatus::Processing => Some(rand::rng().random_range(60..90)),
        _ => None,
    }
}

pub(crate) struct TaskCheck<'a> {
    service: &'a dyn ConversionService,
    task_id: &'a str,
    events: &'a EventSink,
    pub(crate) last_status: Option<TaskStatus>,
}

impl<'a> TaskCheck<'a> {
    pub(crate) fn new(
        service: &'a dyn ConversionService,
        task_id: &'a str,
        events: &'a EventSink,
    ) -> Self {
        Self {
            service,
            task_id,
            events,
            last_status: None,
        }
    }
}

#[async_trait]
impl StatusCheck for TaskCheck<'_> {
    type Output = TaskCompletion;

    fn subject(&self) -> String {
        format!("task {}", self.task_id)
    }

    async fn check(&mut self) -> Result<CheckResult<TaskCompletion>, ClientError> {
        let report = self.service.task_status(self.task_id).await?;
        debug!("Task {} status: {}", self.task_id, report.status.as_str());
        self.last_status = Some(report.status);

        match report.status {
            TaskStatus::Completed => {
                let output_file_name = report
                    .output_file_name
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        ServiceError::InvalidResponse(format!(
                            "task {} completed without an output file name",
                            self.task_id
                        ))
                    })?;
                let download = DownloadRef::File(output_file_name.clone());
                Ok(CheckResult::Done(TaskCompletion {
                    output_file_name,
                    download,
                }))
            }
            TaskStatus::Error => {
                let message = report
                    .error
                    .filter(|msg| !msg.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_ERROR.to_string());
                Err(ClientError::conversion(self.task_id, message))
            }
            status => {
                self.events
                    .emit(ProgressEvent::TaskProgress {
                        task_id: self.task_id.to_string(),
                        status,
                        percent: coarse_progress(status),
                    })
                    .await;
                Ok(CheckResult::Pending)
            }
        }
    }
}

/// Poll a task until it completes, fails or the driver is cancelled.
pub async fn poll_task(
    service: &dyn ConversionService,
    task_id: &str,
    driver: &PollDriver,
    events: &EventSink,
) -> PollOutcome<TaskCompletion> {
    let mut check = TaskCheck::new(service, task_id, events);
    let outcome = driver.run(&mut check).await;
    announce_task_outcome(task_id, &outcome, events).await;
    outcome
}

pub(crate) async fn announce_task_outcome(
    task_id: &str,
    outcome: &PollOutcome<TaskCompletion>,
    events: &EventSink,
) {
    match outcome {
        PollOutcome::Succeeded(completion) => {
            events
                .emit(ProgressEvent::TaskCompleted {
                    task_id: task_id.to_string(),
                    download: completion.download.clone(),
                })
                .await;
        }
        PollOutcome::Failed(e) => {
            let message = match e {
                ClientError::Conversion { message, .. } => message.clone(),
                other => other.to_string(),
            };
            events
                .emit(ProgressEvent::TaskFailed {
                    task_id: task_id.to_string(),
                    message,
                })
                .await;
        }
        PollOutcome::Cancelled => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarse_progress() {
        for _ in 0..50 {
            let percent = coarse_progress(TaskStatus::Processing).unwrap();
            assert!((60..90).contains(&percent));
        }
        assert_eq!(coarse_progress(TaskStatus::Queued), None);
        assert_eq!(coarse_progress(TaskStatus::Uploaded), None);
        assert_eq!(coarse_progress(TaskStatus::Unknown), None);
    }
}
