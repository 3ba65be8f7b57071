//! Upload coordinators for the single and batch flows.

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use crate::error::{ClientError, ValidationError};
use crate::events::{EventSink, ProgressEvent};
use crate::format::{resolve_source_format, FileFormat};
use crate::service::{ConversionRequest, ConversionService, FileUpload, UploadedTask};

use super::registry::{ItemRegistry, ProvisionalKey};

/// Form state for a single-file conversion, as entered by the user.
#[derive(Debug, Clone, Default)]
pub struct SingleSubmission {
    pub file: Option<FileUpload>,
    /// Manual source selection; `None` means detect from the extension.
    pub source_format: Option<FileFormat>,
    pub target_format: Option<FileFormat>,
}

impl SingleSubmission {
    pub fn new(file: FileUpload, target_format: FileFormat) -> Self {
        Self {
            file: Some(file),
            source_format: None,
            target_format: Some(target_format),
        }
    }

    pub fn with_source_format(mut self, format: FileFormat) -> Self {
        self.source_format = Some(format);
        self
    }

    /// Check the submission without touching the network.
    pub fn validate(self) -> Result<ConversionRequest, ValidationError> {
        let file = self.file.ok_or(ValidationError::NoFileSelected)?;
        let target_format = self
            .target_format
            .ok_or(ValidationError::MissingTargetFormat)?;
        let source_format = resolve_source_format(&file.file_name, self.source_format)?;

        Ok(ConversionRequest {
            file,
            source_format,
            target_format,
        })
    }
}

/// Validate and upload one file, returning the task to poll.
pub async fn submit_single(
    service: &dyn ConversionService,
    submission: SingleSubmission,
    events: &EventSink,
) -> Result<UploadedTask, ClientError> {
    let request = submission.validate()?;
    submit_request(service, request, events).await
}

/// Upload an already validated request.
pub async fn submit_request(
    service: &dyn ConversionService,
    request: ConversionRequest,
    events: &EventSink,
) -> Result<UploadedTask, ClientError> {
    let file_name = request.file.file_name.clone();
    info!(
        "Submitting {} ({} -> {})",
        file_name, request.source_format, request.target_format
    );

    let task = service.upload(request).await?;
    info!("Upload of {} accepted as task {}", file_name, task.task_id);

    events
        .emit(ProgressEvent::TaskSubmitted {
            task_id: task.task_id.clone(),
            file_name,
        })
        .await;

    Ok(task)
}

/// Outcome of a batch upload round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchUploadReport {
    /// Provisional key and server id of each accepted file.
    pub uploaded: Vec<(ProvisionalKey, String)>,
    /// Provisional key and failure reason of each rejected file.
    pub failed: Vec<(ProvisionalKey, String)>,
}

impl BatchUploadReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upload files into a batch job concurrently.
///
/// Each file is registered provisionally before its upload starts and promoted
/// when the service answers. Failures are recorded per file and never abort
/// sibling uploads.
pub async fn upload_batch_files(
    service: &dyn ConversionService,
    batch_job_id: &str,
    registry: &mut ItemRegistry,
    files: Vec<FileUpload>,
    events: &EventSink,
) -> BatchUploadReport {
    let mut in_flight = FuturesUnordered::new();

    for file in files {
        let key = registry.register(file.file_name.clone(), file.size());
        events
            .emit(ProgressEvent::ItemQueued {
                key,
                file_name: file.file_name.clone(),
                size: file.size(),
            })
            .await;

        let file_name = file.file_name.clone();
        in_flight.push(async move {
            let result = service.upload_to_batch(batch_job_id, file).await;
            (key, file_name, result)
        });
    }

    let mut report = BatchUploadReport::default();

    while let Some((key, file_name, result)) = in_flight.next().await {
        let promoted = match result {
            Ok(uploaded) => registry
                .promote(key, uploaded.item_id.clone())
                .map(|_| uploaded.item_id)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match promoted {
            Ok(item_id) => {
                info!("Uploaded {} to batch {} as {}", file_name, batch_job_id, item_id);
                events
                    .emit(ProgressEvent::ItemUploaded {
                        key,
                        item_id: item_id.clone(),
                        file_name,
                    })
                    .await;
                report.uploaded.push((key, item_id));
            }
            Err(reason) => {
                warn!("Upload of {} to batch {} failed: {}", file_name, batch_job_id, reason);
                if let Err(e) = registry.mark_upload_failed(key, reason.clone()) {
                    warn!("Failed to record upload failure for {}: {}", key, e);
                }
                events
                    .emit(ProgressEvent::ItemUploadFailed {
                        key,
                        file_name,
                        reason: reason.clone(),
                    })
                    .await;
                report.failed.push((key, reason));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(name: &str) -> FileUpload {
        FileUpload::new(name, b"a,b\n1,2\n".to_vec())
    }

    #[test]
    fn test_validate_requires_file() {
        let submission = SingleSubmission {
            target_format: Some(FileFormat::Json),
            ..Default::default()
        };
        assert_eq!(
            submission.validate().unwrap_err(),
            ValidationError::NoFileSelected
        );
    }

    #[test]
    fn test_validate_requires_target_format() {
        let submission = SingleSubmission {
            file: Some(csv("a.csv")),
            ..Default::default()
        };
        assert_eq!(
            submission.validate().unwrap_err(),
            ValidationError::MissingTargetFormat
        );
    }

    #[test]
    fn test_validate_detects_source_format() {
        let request = SingleSubmission::new(csv("data.JSON"), FileFormat::Csv)
            .validate()
            .unwrap();
        assert_eq!(request.source_format, FileFormat::Json);
        assert_eq!(request.target_format, FileFormat::Csv);
    }

    #[test]
    fn test_validate_unknown_extension_needs_manual_choice() {
        let err = SingleSubmission::new(csv("export.dat"), FileFormat::Json)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnrecognizedExtension { .. }));

        let request = SingleSubmission::new(csv("export.dat"), FileFormat::Json)
            .with_source_format(FileFormat::Csv)
            .validate()
            .unwrap();
        assert_eq!(request.source_format, FileFormat::Csv);
    }
}
