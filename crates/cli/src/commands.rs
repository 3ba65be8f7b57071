//! Command runners for the single and batch flows.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use xconvert_core::{
    service::BatchStatus, BatchSession, CancelHandle, Config, Download, EventSink, FileFormat,
    FileUpload, HttpConversionService, SingleSubmission, TaskSession, Workspace,
};

use crate::render;

/// Buffer size for the progress event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// Progress rendering attached to one command run.
struct Progress {
    events: EventSink,
    renderer: JoinHandle<()>,
}

impl Progress {
    fn start(show_progress: bool) -> Self {
        let (events, rx) = EventSink::channel(EVENT_BUFFER_SIZE);
        let renderer = tokio::spawn(render::run(rx, show_progress));
        Self { events, renderer }
    }

    /// Close the channel and wait for the renderer to flush.
    async fn finish(self) {
        drop(self.events);
        if let Err(e) = self.renderer.await {
            warn!("Renderer task failed: {}", e);
        }
    }
}

/// Cancel `cancel` when the user presses Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    })
}

async fn read_file(path: &Path) -> Result<FileUpload> {
    FileUpload::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

/// Write a download into `dir`, keeping only the final path component of
/// the suggested name.
async fn save_download(dir: &Path, download: Download) -> Result<PathBuf> {
    let file_name = Path::new(&download.file_name)
        .file_name()
        .map(|name| name.to_owned())
        .context("Download has no usable file name")?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let path = dir.join(file_name);
    tokio::fs::write(&path, &download.bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;

    info!("Saved {} bytes to {:?}", download.bytes.len(), path);
    Ok(path)
}

pub async fn run_convert(
    config: &Config,
    file: &Path,
    to: Option<FileFormat>,
    from: Option<FileFormat>,
    output: Option<PathBuf>,
    show_progress: bool,
) -> Result<()> {
    let service = HttpConversionService::new(config.service.clone())
        .context("Failed to create conversion client")?;
    let output = output.unwrap_or_else(|| config.output.directory.clone());
    let upload = read_file(file).await?;

    let progress = Progress::start(show_progress);
    let result = convert(config, &service, upload, to, from, &output, &progress.events).await;
    progress.finish().await;

    let saved = result?;
    println!("Saved {}", saved.display());
    Ok(())
}

async fn convert(
    config: &Config,
    service: &HttpConversionService,
    upload: FileUpload,
    to: Option<FileFormat>,
    from: Option<FileFormat>,
    output: &Path,
    events: &EventSink,
) -> Result<PathBuf> {
    let submission = SingleSubmission {
        file: Some(upload),
        source_format: from,
        target_format: to,
    };

    let mut session = TaskSession::submit(service, submission, &config.polling, events).await?;
    let interrupt = cancel_on_ctrl_c(session.cancel_handle());
    let polled = session.poll(service, events).await;
    interrupt.abort();
    polled?;

    let download = session
        .download(service)
        .await
        .context("Failed to download converted file")?;
    save_download(output, download).await
}

pub async fn run_batch(
    config: &Config,
    files: &[PathBuf],
    to: Option<FileFormat>,
    output: Option<PathBuf>,
    show_progress: bool,
) -> Result<()> {
    let service = HttpConversionService::new(config.service.clone())
        .context("Failed to create conversion client")?;
    let output = output.unwrap_or_else(|| config.output.directory.clone());

    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        uploads.push(read_file(path).await?);
    }

    let progress = Progress::start(show_progress);
    let mut workspace = Workspace::new();
    let result = batch(
        config,
        &service,
        &mut workspace,
        uploads,
        to,
        &output,
        &progress.events,
    )
    .await;
    workspace.reset();
    progress.finish().await;

    match result? {
        Some(saved) => println!("Saved {}", saved.display()),
        None => println!("Nothing to download"),
    }
    Ok(())
}

async fn batch(
    config: &Config,
    service: &HttpConversionService,
    workspace: &mut Workspace,
    uploads: Vec<FileUpload>,
    to: Option<FileFormat>,
    output: &Path,
    events: &EventSink,
) -> Result<Option<PathBuf>> {
    let session = BatchSession::create(service, to, &config.polling, events)
        .await
        .context("Failed to create batch job")?;
    let session = workspace.begin_batch(session);

    let report = session.upload(service, uploads, events).await;
    if !report.all_succeeded() {
        warn!(
            "{} of {} uploads failed",
            report.failed.len(),
            report.failed.len() + report.uploaded.len()
        );
    }

    session
        .start_processing(service, events)
        .await
        .context("Failed to start batch processing")?;

    let interrupt = cancel_on_ctrl_c(session.cancel_handle());
    let polled = session.poll(service, events).await;
    interrupt.abort();
    let completion = polled?;

    let saved = if completion.download_enabled() {
        let download = session
            .download(service)
            .await
            .context("Failed to download batch archive")?;
        Some(save_download(output, download).await?)
    } else {
        None
    };

    if completion.status == BatchStatus::Failed {
        bail!("{}", completion.summary);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_download_strips_directories() {
        let dir = TempDir::new().unwrap();
        let download = Download {
            file_name: "../../etc/out.json".to_string(),
            content_type: None,
            bytes: b"{}".to_vec(),
        };

        let path = save_download(dir.path(), download).await.unwrap();
        assert_eq!(path, dir.path().join("out.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_save_download_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("results").join("today");
        let download = Download {
            file_name: "batch_b-1.zip".to_string(),
            content_type: Some("application/zip".to_string()),
            bytes: vec![1, 2, 3],
        };

        let path = save_download(&nested, download).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_file(Path::new("/definitely/not/here.csv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
