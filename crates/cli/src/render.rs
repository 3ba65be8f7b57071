//! Terminal rendering of progress events.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::debug;

use xconvert_core::{EventEnvelope, ProgressEvent};

/// Format a byte count the way the web client did ("1.5 KB").
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exp = 0;
    let mut unit = 1u64;
    while exp < UNITS.len() - 1 && bytes >= unit * 1024 {
        unit *= 1024;
        exp += 1;
    }
    let rounded = (bytes as f64 / unit as f64 * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exp])
}

fn percent_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:30} [{bar:40}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn items_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:30} [{bar:40}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Draws events as a progress bar plus status lines on stdout.
pub struct Renderer {
    bar: ProgressBar,
    show_progress: bool,
}

impl Renderer {
    pub fn new(show_progress: bool) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            show_progress,
        }
    }

    fn new_bar(&mut self, len: u64, style: ProgressStyle) {
        self.bar = if self.show_progress {
            let bar = ProgressBar::new(len);
            bar.set_style(style);
            bar.enable_steady_tick(Duration::from_millis(200));
            bar
        } else {
            ProgressBar::hidden()
        };
    }

    /// Print a line without tearing the bar.
    fn line(&self, text: impl AsRef<str>) {
        if self.bar.is_hidden() {
            println!("{}", text.as_ref());
        } else {
            self.bar.println(text.as_ref());
        }
    }

    pub fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::TaskSubmitted { task_id, file_name } => {
                self.new_bar(100, percent_style());
                self.bar.set_message(format!("Converting {}", file_name));
                self.bar.set_position(60);
                debug!("Task {} submitted", task_id);
            }
            ProgressEvent::TaskProgress {
                status, percent, ..
            } => {
                self.bar.set_message(status.as_str().to_string());
                if let Some(percent) = percent {
                    self.bar.set_position(u64::from(*percent));
                }
            }
            ProgressEvent::TaskCompleted { .. } => {
                self.bar.set_position(100);
                self.bar.finish_and_clear();
                self.line("Conversion completed");
            }
            ProgressEvent::TaskFailed { message, .. } => {
                self.bar.abandon();
                self.line(format!("Conversion failed: {}", message));
            }
            ProgressEvent::BatchCreated {
                batch_job_id,
                target_format,
            } => {
                self.line(format!(
                    "Created batch {} (target format: {})",
                    batch_job_id, target_format
                ));
            }
            ProgressEvent::ItemQueued {
                file_name, size, ..
            } => {
                self.line(format!("Uploading {} ({})", file_name, format_file_size(*size)));
            }
            ProgressEvent::ItemUploaded { file_name, .. } => {
                self.line(format!("{}: Uploaded", file_name));
            }
            ProgressEvent::ItemUploadFailed {
                file_name, reason, ..
            } => {
                self.line(format!("{}: Upload failed: {}", file_name, reason));
            }
            ProgressEvent::ProcessingStarted { total_items, .. } => {
                self.new_bar(*total_items as u64, items_style());
                self.bar.set_message("Processing");
            }
            ProgressEvent::BatchProgress { progress, .. } => {
                self.bar.set_length(u64::from(progress.total));
                self.bar.set_position(u64::from(progress.completed));
                self.bar
                    .set_message(format!("Processing ({:.0}%)", progress.percentage));
            }
            ProgressEvent::ItemStatusChanged {
                file_name, status, ..
            } => {
                debug!("{} is now {}", file_name, status.label());
            }
            ProgressEvent::StatusLine(line) => {
                self.line(line.text());
            }
            ProgressEvent::BatchFinished { summary, .. } => {
                self.bar.finish_and_clear();
                self.line(summary);
            }
        }
    }

    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Render events until every sender is gone.
pub async fn run(mut rx: mpsc::Receiver<EventEnvelope>, show_progress: bool) {
    let mut renderer = Renderer::new(show_progress);
    while let Some(envelope) = rx.recv().await {
        renderer.handle(&envelope.event);
    }
    renderer.finish();
}
