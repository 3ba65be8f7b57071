//! Types for conversion service operations.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FileFormat;

/// Errors that can occur while talking to the conversion service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Build an HTTP error from a non-success response body.
    ///
    /// The service reports failures as `{"error": "..."}`; that message is
    /// preferred, then the raw body, then a generic message.
    pub fn http(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let body = body.trim();
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.error.trim().is_empty() => parsed.error,
            _ if !body.is_empty() => body.chars().take(500).collect(),
            _ => "Request failed".to_string(),
        };
        Self::Http { status, message }
    }

    /// Whether the failure is likely to go away on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Status of a single conversion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// File stored, conversion not started yet.
    Uploaded,
    /// Waiting for a worker.
    Queued,
    /// Conversion running.
    Processing,
    /// Output file is ready.
    Completed,
    /// Conversion failed.
    Error,
    /// Task id not known to the service (yet), or an unrecognised value.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Uploaded => "uploaded",
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// Aggregate status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::CompletedWithErrors => "completed_with_errors",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::CompletedWithErrors | BatchStatus::Failed
        )
    }
}

/// Status of one item inside a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    /// Capitalized label for display ("Completed").
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::Processing => "Processing",
            ItemStatus::Completed => "Completed",
            ItemStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// Response of `GET {convert}/status/{taskId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusReport {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatusReport {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            output_file_name: None,
            error: None,
        }
    }

    pub fn completed(output_file_name: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Completed,
            output_file_name: Some(output_file_name.into()),
            error: None,
        }
    }

    pub fn failed(error: Option<&str>) -> Self {
        Self {
            status: TaskStatus::Error,
            output_file_name: None,
            error: error.map(str::to_string),
        }
    }
}

/// One entry of the `items` array in a batch status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemReport {
    /// Server-assigned item id.
    pub id: String,
    #[serde(default)]
    pub original_filename: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response of `GET {batch}/status/{batchJobId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_job_id: Option<String>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    pub total_items: u32,
    pub completed_items: u32,
    pub failed_items: u32,
    #[serde(default)]
    pub items: Vec<BatchItemReport>,
}

/// Response of `POST {batch}/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBatch {
    pub batch_job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Response of `POST {batch}/upload/{batchJobId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedItem {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Response of `POST {batch}/process/{batchJobId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStarted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// The service sends this as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<String>,
}

/// Response of `POST {convert}/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedTask {
    pub task_id: String,
    /// Name under which the service stored the upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// File contents to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Original file name, sent as the multipart file name.
    pub file_name: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only its final path component as name.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A validated single-file conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file: FileUpload,
    pub source_format: FileFormat,
    pub target_format: FileFormat,
}

/// Reference to a downloadable result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DownloadRef {
    /// Converted output of a single task, by output file name.
    File(String),
    /// Zip of every completed item of a batch, by batch job id.
    Batch(String),
}

impl DownloadRef {
    /// Path relative to the endpoint prefix, e.g. `download/out.csv`.
    pub fn relative_path(&self) -> String {
        match self {
            DownloadRef::File(name) => format!("download/{}", name),
            DownloadRef::Batch(id) => format!("download/{}", id),
        }
    }

    /// File name to save under when the response does not name one.
    pub fn default_file_name(&self) -> String {
        match self {
            DownloadRef::File(name) => name.clone(),
            DownloadRef::Batch(id) => format!("batch_{}.zip", id),
        }
    }
}

/// A downloaded result.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Trait for conversion service backends.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Upload one file for conversion, returning the task to poll.
    async fn upload(&self, request: ConversionRequest) -> Result<UploadedTask, ServiceError>;

    /// Current status of a single conversion task.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatusReport, ServiceError>;

    /// Create an empty batch job.
    async fn create_batch(&self, target_format: FileFormat) -> Result<CreatedBatch, ServiceError>;

    /// Add one file to a batch job.
    async fn upload_to_batch(
        &self,
        batch_job_id: &str,
        file: FileUpload,
    ) -> Result<UploadedItem, ServiceError>;

    /// Start converting every item of a batch job.
    async fn start_batch(&self, batch_job_id: &str) -> Result<ProcessingStarted, ServiceError>;

    /// Aggregate status of a batch job.
    async fn batch_status(&self, batch_job_id: &str) -> Result<BatchStatusReport, ServiceError>;

    /// Fetch a converted file or a batch archive.
    async fn download(&self, target: &DownloadRef) -> Result<Download, ServiceError>;
}
