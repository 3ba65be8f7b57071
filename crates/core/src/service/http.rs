//! HTTP conversion service implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::format::FileFormat;

use super::{
    BatchStatusReport, ConversionRequest, ConversionService, CreatedBatch, Download, DownloadRef,
    FileUpload, ProcessingStarted, ServiceError, TaskStatusReport, UploadedItem, UploadedTask,
};

/// Which endpoint family a request belongs to.
#[derive(Debug, Clone, Copy)]
enum Api {
    Convert,
    Batch,
}

/// reqwest-backed conversion service client.
pub struct HttpConversionService {
    client: Client,
    config: ServiceConfig,
}

impl HttpConversionService {
    /// Create a new client for the configured service.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ServiceError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Build a full URL from an endpoint family and a path below it.
    fn endpoint(&self, api: Api, path: &str) -> String {
        let prefix = match api {
            Api::Convert => &self.config.convert_path,
            Api::Batch => &self.config.batch_path,
        };
        format!(
            "{}{}/{}",
            self.base_url(),
            prefix.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Full URL for a download reference, suitable for handing to a browser.
    pub fn download_url(&self, target: &DownloadRef) -> String {
        let (api, id) = match target {
            DownloadRef::File(name) => (Api::Convert, name),
            DownloadRef::Batch(id) => (Api::Batch, id),
        };
        self.endpoint(api, &format!("download/{}", urlencoding::encode(id)))
    }

    /// Send a request and fail on non-success status.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response = request.send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::http(status.as_u16(), &body));
        }

        Ok(response)
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

fn map_send_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else if e.is_connect() {
        ServiceError::ConnectionFailed(e.to_string())
    } else {
        ServiceError::Internal(e.to_string())
    }
}

/// Extract `filename` from a `Content-Disposition` header value.
fn parse_content_disposition(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let name = param.strip_prefix("filename=")?;
        let name = name.trim_matches('"').trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    })
}

fn file_part(file: FileUpload) -> multipart::Part {
    multipart::Part::bytes(file.bytes).file_name(file.file_name)
}

#[async_trait]
impl ConversionService for HttpConversionService {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, request: ConversionRequest) -> Result<UploadedTask, ServiceError> {
        debug!(
            "Uploading {} ({} -> {})",
            request.file.file_name, request.source_format, request.target_format
        );
        let form = multipart::Form::new()
            .part("file", file_part(request.file))
            .text("sourceFormat", request.source_format.as_str())
            .text("targetFormat", request.target_format.as_str());

        let url = self.endpoint(Api::Convert, "upload");
        self.send_json(self.client.post(&url).multipart(form)).await
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusReport, ServiceError> {
        let url = self.endpoint(
            Api::Convert,
            &format!("status/{}", urlencoding::encode(task_id)),
        );
        self.send_json(self.client.get(&url)).await
    }

    async fn create_batch(&self, target_format: FileFormat) -> Result<CreatedBatch, ServiceError> {
        let url = self.endpoint(Api::Batch, "create");
        let request = self
            .client
            .post(&url)
            .query(&[("targetFormat", target_format.as_str())]);
        self.send_json(request).await
    }

    async fn upload_to_batch(
        &self,
        batch_job_id: &str,
        file: FileUpload,
    ) -> Result<UploadedItem, ServiceError> {
        debug!("Uploading {} to batch {}", file.file_name, batch_job_id);
        let form = multipart::Form::new().part("file", file_part(file));
        let url = self.endpoint(
            Api::Batch,
            &format!("upload/{}", urlencoding::encode(batch_job_id)),
        );
        self.send_json(self.client.post(&url).multipart(form)).await
    }

    async fn start_batch(&self, batch_job_id: &str) -> Result<ProcessingStarted, ServiceError> {
        let url = self.endpoint(
            Api::Batch,
            &format!("process/{}", urlencoding::encode(batch_job_id)),
        );
        self.send_json(self.client.post(&url)).await
    }

    async fn batch_status(&self, batch_job_id: &str) -> Result<BatchStatusReport, ServiceError> {
        let url = self.endpoint(
            Api::Batch,
            &format!("status/{}", urlencoding::encode(batch_job_id)),
        );
        self.send_json(self.client.get(&url)).await
    }

    async fn download(&self, target: &DownloadRef) -> Result<Download, ServiceError> {
        let url = self.download_url(target);
        let response = self.send(self.client.get(&url)).await?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition)
            .unwrap_or_else(|| target.default_file_name());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?
            .to_vec();

        Ok(Download {
            file_name,
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(url: &str) -> HttpConversionService {
        HttpConversionService::new(ServiceConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let svc = service("http://localhost:8082/");
        assert_eq!(
            svc.endpoint(Api::Convert, "upload"),
            "http://localhost:8082/api/convert/upload"
        );
        assert_eq!(
            svc.endpoint(Api::Batch, "/status/b-1"),
            "http://localhost:8082/api/batch/status/b-1"
        );
    }

    #[test]
    fn test_download_url() {
        let svc = service("http://localhost:8082");
        assert_eq!(
            svc.download_url(&DownloadRef::File("out.csv".to_string())),
            "http://localhost:8082/api/convert/download/out.csv"
        );
        assert_eq!(
            svc.download_url(&DownloadRef::Batch("b-7".to_string())),
            "http://localhost:8082/api/batch/download/b-7"
        );
    }

    #[test]
    fn test_download_url_encodes_segment() {
        let svc = service("http://localhost:8082");
        assert_eq!(
            svc.download_url(&DownloadRef::File("my report.csv".to_string())),
            "http://localhost:8082/api/convert/download/my%20report.csv"
        );
    }

    #[test]
    fn test_parse_content_disposition() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"batch_b-1.zip\""),
            Some("batch_b-1.zip".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=out.json"),
            Some("out.json".to_string())
        );
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition("attachment; filename=\"\""), None);
    }
}
