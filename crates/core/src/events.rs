//! Progress events emitted while a conversion runs.
//!
//! Library code never prints; everything a user would see goes through an
//! [`EventSink`] and is rendered by the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::format::FileFormat;
use crate::poller::BatchProgress;
use crate::service::{BatchStatus, DownloadRef, ItemStatus, TaskStatus};
use crate::upload::ProvisionalKey;

/// How a batch item ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LineOutcome {
    Success,
    Failure { reason: String },
}

/// The one human-readable line announced when an item reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub item_id: String,
    pub file_name: String,
    pub outcome: LineOutcome,
}

impl StatusLine {
    pub fn text(&self) -> String {
        match &self.outcome {
            LineOutcome::Success => format!("{}: Converted successfully", self.file_name),
            LineOutcome::Failure { reason } => format!("{}: Failed: {}", self.file_name, reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LineOutcome::Success)
    }
}

/// Everything observable about a running conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    // Single conversion
    TaskSubmitted {
        task_id: String,
        file_name: String,
    },
    TaskProgress {
        task_id: String,
        status: TaskStatus,
        /// Coarse progress hint; the service does not report real progress.
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<u8>,
    },
    TaskCompleted {
        task_id: String,
        download: DownloadRef,
    },
    TaskFailed {
        task_id: String,
        message: String,
    },

    // Batch conversion
    BatchCreated {
        batch_job_id: String,
        target_format: FileFormat,
    },
    ItemQueued {
        key: ProvisionalKey,
        file_name: String,
        size: u64,
    },
    ItemUploaded {
        key: ProvisionalKey,
        item_id: String,
        file_name: String,
    },
    ItemUploadFailed {
        key: ProvisionalKey,
        file_name: String,
        reason: String,
    },
    ProcessingStarted {
        batch_job_id: String,
        total_items: usize,
    },
    BatchProgress {
        batch_job_id: String,
        progress: BatchProgress,
    },
    ItemStatusChanged {
        item_id: String,
        file_name: String,
        status: ItemStatus,
    },
    StatusLine(StatusLine),
    BatchFinished {
        batch_job_id: String,
        status: BatchStatus,
        summary: String,
        download_enabled: bool,
    },
}

/// Envelope wrapping an event with the time it was emitted.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: ProgressEvent,
}

/// Handle for emitting progress events.
///
/// Cheaply cloneable. A disabled sink drops events; a sink whose receiver is
/// gone logs the failure but never fails the caller.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<EventEnvelope>>,
}

impl EventSink {
    /// Create a sink from a channel sender.
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a sink and the receiver it feeds.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = tx.send(envelope).await {
            tracing::warn!("Failed to emit progress event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_text() {
        let ok = StatusLine {
            item_id: "i-1".to_string(),
            file_name: "a.csv".to_string(),
            outcome: LineOutcome::Success,
        };
        assert_eq!(ok.text(), "a.csv: Converted successfully");
        assert!(ok.is_success());

        let failed = StatusLine {
            item_id: "i-2".to_string(),
            file_name: "b.csv".to_string(),
            outcome: LineOutcome::Failure {
                reason: "Malformed row 3".to_string(),
            },
        };
        assert_eq!(failed.text(), "b.csv: Failed: Malformed row 3");
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (sink, mut rx) = EventSink::channel(4);
        sink.emit(ProgressEvent::TaskSubmitted {
            task_id: "t-1".to_string(),
            file_name: "data.csv".to_string(),
        })
        .await;

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(
            envelope.event,
            ProgressEvent::TaskSubmitted { ref task_id, .. } if task_id == "t-1"
        ));
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped_does_not_panic() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        sink.emit(ProgressEvent::TaskFailed {
            task_id: "t-1".to_string(),
            message: "boom".to_string(),
        })
        .await;
    }

    #[tokio::test]
    async fn test_disabled_sink() {
        let sink = EventSink::disabled();
        sink.emit(ProgressEvent::ProcessingStarted {
            batch_job_id: "b-1".to_string(),
            total_items: 0,
        })
        .await;
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = ProgressEvent::TaskProgress {
            task_id: "t-1".to_string(),
            status: TaskStatus::Processing,
            percent: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_progress");
        assert_eq!(json["status"], "processing");
        assert!(json.get("percent").is_none());
    }
}
