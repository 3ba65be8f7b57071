//! Batch job polling and item reconciliation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::events::{EventSink, LineOutcome, ProgressEvent, StatusLine};
use crate::service::{
    BatchItemReport, BatchStatus, BatchStatusReport, ConversionService, DownloadRef, ItemStatus,
};
use crate::upload::ItemRegistry;

use super::driver::PollDriver;
use super::state::{CheckResult, PollOutcome, StatusCheck};

const FALLBACK_REASON: &str = "Unknown error";

/// Aggregate progress of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: u32,
    /// Items in a terminal state, successful or not.
    pub completed: u32,
    /// 0..=100; 0 when the batch is empty.
    pub percentage: f64,
}

impl BatchProgress {
    pub fn from_counts(total: u32, completed_items: u32, failed_items: u32) -> Self {
        let completed = completed_items + failed_items;
        let percentage = if total == 0 {
            0.0
        } else {
            completed as f64 * 100.0 / total as f64
        };
        Self {
            total,
            completed,
            percentage,
        }
    }

    pub fn from_report(report: &BatchStatusReport) -> Self {
        Self::from_counts(
            report.total_items,
            report.completed_items,
            report.failed_items,
        )
    }
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Items whose status changed: (server id, file name, new status).
    pub changed: Vec<(String, String, ItemStatus)>,
    /// Status lines for items that just reached a terminal status.
    pub lines: Vec<StatusLine>,
    /// Server items with no local counterpart.
    pub skipped: usize,
}

/// Apply the authoritative item list to the registry.
///
/// Idempotent: replaying the same list changes nothing and yields no lines.
/// At most one status line is ever produced per item.
pub fn reconcile(registry: &mut ItemRegistry, items: &[BatchItemReport]) -> Reconciliation {
    let mut result = Reconciliation::default();

    for report in items {
        let Some(item) = registry.get_mut(&report.id) else {
            debug!("Skipping unknown batch item {}", report.id);
            result.skipped += 1;
            continue;
        };

        if !report.original_filename.is_empty() {
            item.file_name = report.original_filename.clone();
        }
        if item.status != report.status {
            item.status = report.status;
            result
                .changed
                .push((report.id.clone(), item.file_name.clone(), report.status));
        }
        if report.error_message.is_some() {
            item.error_message = report.error_message.clone();
        }

        if item.status.is_terminal() && !item.announced {
            item.announced = true;
            let outcome = match item.status {
                ItemStatus::Completed => LineOutcome::Success,
                _ => LineOutcome::Failure {
                    reason: item
                        .error_message
                        .clone()
                        .filter(|reason| !reason.trim().is_empty())
                        .unwrap_or_else(|| FALLBACK_REASON.to_string()),
                },
            };
            result.lines.push(StatusLine {
                item_id: report.id.clone(),
                file_name: item.file_name.clone(),
                outcome,
            });
        }
    }

    result
}

/// A batch job that reached a terminal status.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCompletion {
    pub status: BatchStatus,
    pub progress: BatchProgress,
    pub completed_items: u32,
    pub failed_items: u32,
    /// Bulk download; only offered when at least one item converted.
    pub download: Option<DownloadRef>,
    pub summary: String,
}

impl BatchCompletion {
    pub fn from_report(batch_job_id: &str, report: &BatchStatusReport) -> Self {
        let download = (report.completed_items > 0)
            .then(|| DownloadRef::Batch(batch_job_id.to_string()));
        let summary = format!(
            "Batch processing {}: {} of {} files converted successfully.",
            report.status.as_str(),
            report.completed_items,
            report.total_items
        );
        Self {
            status: report.status,
            progress: BatchProgress::from_report(report),
            completed_items: report.completed_items,
            failed_items: report.failed_items,
            download,
            summary,
        }
    }

    pub fn download_enabled(&self) -> bool {
        self.download.is_some()
    }
}

pub(crate) struct BatchCheck<'a> {
    service: &'a dyn ConversionService,
    batch_job_id: &'a str,
    registry: &'a mut ItemRegistry,
    events: &'a EventSink,
}

impl<'a> BatchCheck<'a> {
    pub(crate) fn new(
        service: &'a dyn ConversionService,
        batch_job_id: &'a str,
        registry: &'a mut ItemRegistry,
        events: &'a EventSink,
    ) -> Self {
        Self {
            service,
            batch_job_id,
            registry,
            events,
        }
    }
}

#[async_trait]
impl StatusCheck for BatchCheck<'_> {
    type Output = BatchCompletion;

    fn subject(&self) -> String {
        format!("batch {}", self.batch_job_id)
    }

    async fn check(&mut self) -> Result<CheckResult<BatchCompletion>, ClientError> {
        let report = self.service.batch_status(self.batch_job_id).await?;
        let progress = BatchProgress::from_report(&report);
        debug!(
            "Batch {} status: {} ({}/{})",
            self.batch_job_id,
            report.status.as_str(),
            progress.completed,
            progress.total
        );

        self.events
            .emit(ProgressEvent::BatchProgress {
                batch_job_id: self.batch_job_id.to_string(),
                progress,
            })
            .await;

        let reconciliation = reconcile(&mut *self.registry, &report.items);
        for (item_id, file_name, status) in reconciliation.changed {
            self.events
                .emit(ProgressEvent::ItemStatusChanged {
                    item_id,
                    file_name,
                    status,
                })
                .await;
        }
        for line in reconciliation.lines {
            info!("{}", line.text());
            self.events.emit(ProgressEvent::StatusLine(line)).await;
        }

        if report.status.is_terminal() {
            Ok(CheckResult::Done(BatchCompletion::from_report(
                self.batch_job_id,
                &report,
            )))
        } else {
            Ok(CheckResult::Pending)
        }
    }
}

/// Poll a batch job until it is terminal, reconciling items on every answer.
pub async fn poll_batch(
    service: &dyn ConversionService,
    batch_job_id: &str,
    registry: &mut ItemRegistry,
    driver: &PollDriver,
    events: &EventSink,
) -> PollOutcome<BatchCompletion> {
    let mut check = BatchCheck::new(service, batch_job_id, registry, events);
    let outcome = driver.run(&mut check).await;

    if let PollOutcome::Succeeded(completion) = &outcome {
        info!("{}", completion.summary);
        events
            .emit(ProgressEvent::BatchFinished {
                batch_job_id: batch_job_id.to_string(),
                status: completion.status,
                summary: completion.summary.clone(),
                download_enabled: completion.download_enabled(),
            })
            .await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, name: &str, status: ItemStatus, error: Option<&str>) -> BatchItemReport {
        BatchItemReport {
            id: id.to_string(),
            original_filename: name.to_string(),
            status,
            source_format: Some("csv".to_string()),
            output_filename: None,
            error_message: error.map(str::to_string),
        }
    }

    fn report(status: BatchStatus, total: u32, completed: u32, failed: u32) -> BatchStatusReport {
        BatchStatusReport {
            batch_job_id: Some("b-1".to_string()),
            status,
            target_format: Some("json".to_string()),
            total_items: total,
            completed_items: completed,
            failed_items: failed,
            items: vec![],
        }
    }

    fn registry_with(names: &[(&str, &str)]) -> ItemRegistry {
        let mut registry = ItemRegistry::new();
        for (name, id) in names {
            let key = registry.register(*name, 10);
            registry.promote(key, *id).unwrap();
        }
        registry
    }

    #[test]
    fn test_progress_percentage() {
        let progress = BatchProgress::from_counts(5, 3, 1);
        assert_eq!(progress.completed, 4);
        assert_eq!(progress.percentage, 80.0);

        let empty = BatchProgress::from_counts(0, 0, 0);
        assert_eq!(empty.percentage, 0.0);
    }

    #[test]
    fn test_reconcile_emits_one_line_per_item() {
        let mut registry = registry_with(&[("a.csv", "i-1"), ("b.csv", "i-2")]);

        let first = reconcile(
            &mut registry,
            &[
                item("i-1", "a.csv", ItemStatus::Processing, None),
                item("i-2", "b.csv", ItemStatus::Pending, None),
            ],
        );
        assert_eq!(first.changed.len(), 1);
        assert!(first.lines.is_empty());

        let terminal = [
            item("i-1", "a.csv", ItemStatus::Completed, None),
            item("i-2", "b.csv", ItemStatus::Failed, Some("Malformed row 3")),
        ];
        let second = reconcile(&mut registry, &terminal);
        assert_eq!(second.lines.len(), 2);
        assert_eq!(second.lines[0].text(), "a.csv: Converted successfully");
        assert_eq!(second.lines[1].text(), "b.csv: Failed: Malformed row 3");

        // Replaying the same list is a no-op.
        let third = reconcile(&mut registry, &terminal);
        assert!(third.changed.is_empty());
        assert!(third.lines.is_empty());
        assert!(registry.get("i-1").unwrap().announced);
    }

    #[test]
    fn test_reconcile_failure_without_reason() {
        let mut registry = registry_with(&[("a.csv", "i-1")]);
        let result = reconcile(
            &mut registry,
            &[item("i-1", "a.csv", ItemStatus::Failed, None)],
        );
        assert_eq!(result.lines[0].text(), "a.csv: Failed: Unknown error");
    }

    #[test]
    fn test_reconcile_skips_unknown_items() {
        let mut registry = registry_with(&[("a.csv", "i-1")]);
        let result = reconcile(
            &mut registry,
            &[item("i-9", "ghost.csv", ItemStatus::Completed, None)],
        );
        assert_eq!(result.skipped, 1);
        assert!(result.lines.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn test_completion_summary_and_download() {
        let done = BatchCompletion::from_report("b-1", &report(BatchStatus::CompletedWithErrors, 3, 2, 1));
        assert_eq!(
            done.summary,
            "Batch processing completed_with_errors: 2 of 3 files converted successfully."
        );
        assert_eq!(done.download, Some(DownloadRef::Batch("b-1".to_string())));

        let failed = BatchCompletion::from_report("b-1", &report(BatchStatus::Failed, 2, 0, 2));
        assert!(!failed.download_enabled());
        assert_eq!(failed.progress.percentage, 100.0);
    }
}
