//! Mock conversion service for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::format::FileFormat;
use crate::service::{
    BatchStatusReport, ConversionRequest, ConversionService, CreatedBatch, Download, DownloadRef,
    FileUpload, ProcessingStarted, ServiceError, TaskStatusReport, UploadedItem, UploadedTask,
};

/// A recorded service call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Upload {
        file_name: String,
        source_format: FileFormat,
        target_format: FileFormat,
    },
    TaskStatus(String),
    CreateBatch(FileFormat),
    UploadToBatch {
        batch_job_id: String,
        file_name: String,
    },
    StartBatch(String),
    BatchStatus(String),
    Download(DownloadRef),
}

/// Scripted answers for one id. The last successful answer repeats forever.
type Script<T> = VecDeque<Result<T, ServiceError>>;

/// Mock implementation of the ConversionService trait.
///
/// Provides controllable behavior for testing:
/// - Script task and batch status sequences
/// - Reject batch uploads by file name
/// - Track calls for assertions
/// - Simulate failures and slow responses
///
/// Ids are deterministic: tasks are `task-1`, `task-2`, ...; batches
/// `batch-1`, ...; a batch item uploaded as `a.csv` becomes `item-a.csv`.
///
/// # Example
///
/// ```rust,ignore
/// let service = MockConversionService::new();
/// service
///     .script_task_status("task-1", vec![
///         TaskStatusReport::new(TaskStatus::Processing),
///         TaskStatusReport::completed("out.json"),
///     ])
///     .await;
///
/// let task = service.upload(request).await?;
/// assert_eq!(task.task_id, "task-1");
/// ```
#[derive(Debug)]
pub struct MockConversionService {
    /// Recorded calls in order.
    calls: Arc<RwLock<Vec<(MockCall, chrono::DateTime<Utc>)>>>,
    task_scripts: Arc<RwLock<HashMap<String, Script<TaskStatusReport>>>>,
    batch_scripts: Arc<RwLock<HashMap<String, Script<BatchStatusReport>>>>,
    /// Batch uploads of these file names fail with HTTP 400.
    rejected_uploads: Arc<RwLock<HashSet<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<ServiceError>>>,
    task_counter: Arc<RwLock<u32>>,
    batch_counter: Arc<RwLock<u32>>,
    /// Delay applied to status queries.
    status_latency: Option<Duration>,
}

impl Default for MockConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConversionService {
    /// Create a new mock conversion service.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            task_scripts: Arc::new(RwLock::new(HashMap::new())),
            batch_scripts: Arc::new(RwLock::new(HashMap::new())),
            rejected_uploads: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            task_counter: Arc::new(RwLock::new(0)),
            batch_counter: Arc::new(RwLock::new(0)),
            status_latency: None,
        }
    }

    /// Create a mock whose status queries take `latency` to answer.
    pub fn with_status_latency(latency: Duration) -> Self {
        Self {
            status_latency: Some(latency),
            ..Self::new()
        }
    }

    /// Script the status answers for a task.
    pub async fn script_task_status(&self, task_id: &str, reports: Vec<TaskStatusReport>) {
        self.script_task_results(task_id, reports.into_iter().map(Ok).collect())
            .await;
    }

    /// Script task status answers including failures.
    pub async fn script_task_results(
        &self,
        task_id: &str,
        results: Vec<Result<TaskStatusReport, ServiceError>>,
    ) {
        self.task_scripts
            .write()
            .await
            .insert(task_id.to_string(), results.into());
    }

    /// Script the status answers for a batch.
    pub async fn script_batch_status(&self, batch_job_id: &str, reports: Vec<BatchStatusReport>) {
        self.script_batch_results(batch_job_id, reports.into_iter().map(Ok).collect())
            .await;
    }

    /// Script batch status answers including failures.
    pub async fn script_batch_results(
        &self,
        batch_job_id: &str,
        results: Vec<Result<BatchStatusReport, ServiceError>>,
    ) {
        self.batch_scripts
            .write()
            .await
            .insert(batch_job_id.to_string(), results.into());
    }

    /// Make batch uploads of `file_name` fail.
    pub async fn reject_upload(&self, file_name: &str) {
        self.rejected_uploads
            .write()
            .await
            .insert(file_name.to_string());
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ServiceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls
            .read()
            .await
            .iter()
            .map(|(call, _)| call.clone())
            .collect()
    }

    /// Number of status queries made for a task or batch id.
    pub async fn status_calls(&self, id: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(call, _)| {
                matches!(call, MockCall::TaskStatus(x) | MockCall::BatchStatus(x) if x == id)
            })
            .count()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Item id assigned to a batch upload of `file_name`.
    pub fn item_id(file_name: &str) -> String {
        format!("item-{}", file_name)
    }

    async fn record(&self, call: MockCall) {
        self.calls.write().await.push((call, Utc::now()));
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<ServiceError> {
        self.next_error.write().await.take()
    }

    async fn next_id(counter: &RwLock<u32>, prefix: &str) -> String {
        let mut counter = counter.write().await;
        *counter += 1;
        format!("{}-{}", prefix, *counter)
    }

    async fn delay(&self) {
        if let Some(latency) = self.status_latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_answer<T: Clone>(script: Option<&mut Script<T>>, id: &str) -> Result<T, ServiceError> {
        let not_found = || ServiceError::http(404, &format!("{} not found", id));
        let Some(script) = script else {
            return Err(not_found());
        };
        match script.front() {
            Some(Ok(last)) if script.len() == 1 => Ok(last.clone()),
            _ => script.pop_front().unwrap_or_else(|| Err(not_found())),
        }
    }
}

#[async_trait]
impl ConversionService for MockConversionService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, request: ConversionRequest) -> Result<UploadedTask, ServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(MockCall::Upload {
            file_name: request.file.file_name.clone(),
            source_format: request.source_format,
            target_format: request.target_format,
        })
        .await;

        Ok(UploadedTask {
            task_id: Self::next_id(&self.task_counter, "task").await,
            file_name: Some(request.file.file_name),
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusReport, ServiceError> {
        self.record(MockCall::TaskStatus(task_id.to_string())).await;
        self.delay().await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut scripts = self.task_scripts.write().await;
        Self::next_answer(scripts.get_mut(task_id), task_id)
    }

    async fn create_batch(&self, target_format: FileFormat) -> Result<CreatedBatch, ServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(MockCall::CreateBatch(target_format)).await;
        Ok(CreatedBatch {
            batch_job_id: Self::next_id(&self.batch_counter, "batch").await,
            target_format: Some(target_format.to_string()),
            status: Some("pending".to_string()),
        })
    }

    async fn upload_to_batch(
        &self,
        batch_job_id: &str,
        file: FileUpload,
    ) -> Result<UploadedItem, ServiceError> {
        self.record(MockCall::UploadToBatch {
            batch_job_id: batch_job_id.to_string(),
            file_name: file.file_name.clone(),
        })
        .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if self.rejected_uploads.read().await.contains(&file.file_name) {
            return Err(ServiceError::http(
                400,
                &format!(r#"{{"error": "Failed to upload {}"}}"#, file.file_name),
            ));
        }

        Ok(UploadedItem {
            item_id: Self::item_id(&file.file_name),
            filename: Some(file.file_name),
            status: Some("pending".to_string()),
        })
    }

    async fn start_batch(&self, batch_job_id: &str) -> Result<ProcessingStarted, ServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(MockCall::StartBatch(batch_job_id.to_string()))
            .await;
        Ok(ProcessingStarted {
            batch_job_id: Some(batch_job_id.to_string()),
            status: Some("processing".to_string()),
            total_items: None,
        })
    }

    async fn batch_status(&self, batch_job_id: &str) -> Result<BatchStatusReport, ServiceError> {
        self.record(MockCall::BatchStatus(batch_job_id.to_string()))
            .await;
        self.delay().await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut scripts = self.batch_scripts.write().await;
        Self::next_answer(scripts.get_mut(batch_job_id), batch_job_id)
    }

    async fn download(&self, target: &DownloadRef) -> Result<Download, ServiceError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.record(MockCall::Download(target.clone())).await;
        let content_type = match target {
            DownloadRef::File(_) => "application/octet-stream",
            DownloadRef::Batch(_) => "application/zip",
        };
        Ok(Download {
            file_name: target.default_file_name(),
            content_type: Some(content_type.to_string()),
            bytes: b"converted".to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::TaskStatus;

    #[tokio::test]
    async fn test_last_answer_repeats() {
        let service = MockConversionService::new();
        service
            .script_task_status("task-1", vec![TaskStatusReport::new(TaskStatus::Queued)])
            .await;

        for _ in 0..3 {
            let report = service.task_status("task-1").await.unwrap();
            assert_eq!(report.status, TaskStatus::Queued);
        }
        assert_eq!(service.status_calls("task-1").await, 3);
    }

    #[tokio::test]
    async fn test_unscripted_status_is_not_found() {
        let service = MockConversionService::new();
        let err = service.task_status("nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_rejected_upload() {
        let service = MockConversionService::new();
        service.reject_upload("bad.csv").await;

        let err = service
            .upload_to_batch("batch-1", FileUpload::new("bad.csv", b"x".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 400: Failed to upload bad.csv");

        let ok = service
            .upload_to_batch("batch-1", FileUpload::new("good.csv", b"x".to_vec()))
            .await
            .unwrap();
        assert_eq!(ok.item_id, "item-good.csv");
    }

    #[tokio::test]
    async fn test_next_error_applies_once() {
        let service = MockConversionService::new();
        service.set_next_error(ServiceError::Timeout).await;

        assert!(service.create_batch(FileFormat::Json).await.is_err());
        let created = service.create_batch(FileFormat::Json).await.unwrap();
        assert_eq!(created.batch_job_id, "batch-1");
    }
}
