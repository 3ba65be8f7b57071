//! Single conversion session.

use chrono::{DateTime, Utc};

use crate::error::{ClientError, ValidationError};
use crate::events::EventSink;
use crate::format::FileFormat;
use crate::poller::{
    announce_task_outcome, CancelHandle, PollDriver, PollOutcome, PollingConfig, Schedule,
    TaskCheck, TaskCompletion,
};
use crate::service::{ConversionService, Download, TaskStatus};
use crate::upload::{submit_request, SingleSubmission};

/// State of one submitted conversion task.
#[derive(Debug)]
pub struct TaskSession {
    task_id: String,
    file_name: String,
    source_format: FileFormat,
    target_format: FileFormat,
    submitted_at: DateTime<Utc>,
    last_status: Option<TaskStatus>,
    completion: Option<TaskCompletion>,
    polling: PollingConfig,
    cancel: CancelHandle,
}

impl TaskSession {
    /// Validate and upload a file, opening a session for the new task.
    pub async fn submit(
        service: &dyn ConversionService,
        submission: SingleSubmission,
        polling: &PollingConfig,
        events: &EventSink,
    ) -> Result<Self, ClientError> {
        let request = submission.validate()?;
        let file_name = request.file.file_name.clone();
        let source_format = request.source_format;
        let target_format = request.target_format;

        let task = submit_request(service, request, events).await?;

        Ok(Self {
            task_id: task.task_id,
            file_name,
            source_format,
            target_format,
            submitted_at: Utc::now(),
            last_status: None,
            completion: None,
            polling: polling.clone(),
            cancel: CancelHandle::new(),
        })
    }

    /// Poll until the task completes or fails. Polls are strictly sequential.
    pub async fn poll(
        &mut self,
        service: &dyn ConversionService,
        events: &EventSink,
    ) -> Result<TaskCompletion, ClientError> {
        let driver =
            PollDriver::new(&self.polling, Schedule::Sequential).with_cancel(self.cancel.clone());
        let mut check = TaskCheck::new(service, &self.task_id, events);
        let outcome = driver.run(&mut check).await;
        if check.last_status.is_some() {
            self.last_status = check.last_status;
        }

        announce_task_outcome(&self.task_id, &outcome, events).await;
        if let PollOutcome::Succeeded(completion) = &outcome {
            self.completion = Some(completion.clone());
        }
        outcome.into_result()
    }

    /// Download the converted file.
    pub async fn download(&self, service: &dyn ConversionService) -> Result<Download, ClientError> {
        let completion = self
            .completion
            .as_ref()
            .ok_or(ValidationError::NothingToDownload)?;
        Ok(service.download(&completion.download).await?)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn source_format(&self) -> FileFormat {
        self.source_format
    }

    pub fn target_format(&self) -> FileFormat {
        self.target_format
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn last_status(&self) -> Option<TaskStatus> {
        self.last_status
    }

    pub fn completion(&self) -> Option<&TaskCompletion> {
        self.completion.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
