//! Batch conversion session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClientError, ValidationError};
use crate::events::{EventSink, ProgressEvent};
use crate::format::FileFormat;
use crate::poller::{
    poll_batch, BatchCompletion, CancelHandle, PollDriver, PollOutcome, PollingConfig, Schedule,
};
use crate::service::{ConversionService, Download, FileUpload, ProcessingStarted};
use crate::upload::{upload_batch_files, BatchUploadReport, ItemRegistry};

/// Lifecycle of a batch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    /// Batch created; files may be uploaded.
    Collecting,
    /// Processing started; polling for status.
    Processing,
    /// Terminal status received.
    Finished,
    /// Polling failed.
    Failed,
    /// Polling cancelled by the user.
    Cancelled,
}

/// State of one batch job, from creation to download.
#[derive(Debug)]
pub struct BatchSession {
    batch_job_id: String,
    target_format: FileFormat,
    created_at: DateTime<Utc>,
    registry: ItemRegistry,
    phase: BatchPhase,
    completion: Option<BatchCompletion>,
    polling: PollingConfig,
    cancel: CancelHandle,
}

impl BatchSession {
    /// Create a batch job on the service.
    pub async fn create(
        service: &dyn ConversionService,
        target_format: Option<FileFormat>,
        polling: &PollingConfig,
        events: &EventSink,
    ) -> Result<Self, ClientError> {
        let target_format = target_format.ok_or(ValidationError::MissingTargetFormat)?;
        let created = service.create_batch(target_format).await?;
        info!(
            "Created batch {} targeting {}",
            created.batch_job_id, target_format
        );

        events
            .emit(ProgressEvent::BatchCreated {
                batch_job_id: created.batch_job_id.clone(),
                target_format,
            })
            .await;

        Ok(Self {
            batch_job_id: created.batch_job_id,
            target_format,
            created_at: Utc::now(),
            registry: ItemRegistry::new(),
            phase: BatchPhase::Collecting,
            completion: None,
            polling: polling.clone(),
            cancel: CancelHandle::new(),
        })
    }

    /// Upload files into the batch. Per-file failures are reported, not raised.
    pub async fn upload(
        &mut self,
        service: &dyn ConversionService,
        files: Vec<FileUpload>,
        events: &EventSink,
    ) -> BatchUploadReport {
        upload_batch_files(
            service,
            &self.batch_job_id,
            &mut self.registry,
            files,
            events,
        )
        .await
    }

    /// Ask the service to start converting the uploaded files.
    pub async fn start_processing(
        &mut self,
        service: &dyn ConversionService,
        events: &EventSink,
    ) -> Result<ProcessingStarted, ClientError> {
        let total_items = self.registry.registered_count();
        if total_items == 0 {
            return Err(ValidationError::NothingUploaded.into());
        }

        let ack = service.start_batch(&self.batch_job_id).await?;
        self.phase = BatchPhase::Processing;
        info!(
            "Started processing batch {} ({} items)",
            self.batch_job_id, total_items
        );

        events
            .emit(ProgressEvent::ProcessingStarted {
                batch_job_id: self.batch_job_id.clone(),
                total_items,
            })
            .await;

        Ok(ack)
    }

    /// Poll until the batch is terminal. Cancel through [`cancel_handle`](Self::cancel_handle).
    pub async fn poll(
        &mut self,
        service: &dyn ConversionService,
        events: &EventSink,
    ) -> Result<BatchCompletion, ClientError> {
        let driver =
            PollDriver::new(&self.polling, Schedule::FixedRate).with_cancel(self.cancel.clone());
        let outcome = poll_batch(
            service,
            &self.batch_job_id,
            &mut self.registry,
            &driver,
            events,
        )
        .await;

        self.phase = match &outcome {
            PollOutcome::Succeeded(completion) => {
                self.completion = Some(completion.clone());
                BatchPhase::Finished
            }
            PollOutcome::Failed(_) => BatchPhase::Failed,
            PollOutcome::Cancelled => BatchPhase::Cancelled,
        };
        outcome.into_result()
    }

    /// Download the zip of converted files.
    pub async fn download(&self, service: &dyn ConversionService) -> Result<Download, ClientError> {
        let target = self
            .completion
            .as_ref()
            .and_then(|completion| completion.download.as_ref())
            .ok_or(ValidationError::NothingToDownload)?;
        Ok(service.download(target).await?)
    }

    pub fn batch_job_id(&self) -> &str {
        &self.batch_job_id
    }

    pub fn target_format(&self) -> FileFormat {
        self.target_format
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn completion(&self) -> Option<&BatchCompletion> {
        self.completion.as_ref()
    }

    pub fn download_enabled(&self) -> bool {
        self.completion
            .as_ref()
            .is_some_and(BatchCompletion::download_enabled)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stop any poll running on this session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
