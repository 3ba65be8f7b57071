//! Testing utilities and a mock conversion service.
//!
//! # Example
//!
//! ```rust,ignore
//! use xconvert_core::testing::{fixtures, MockConversionService};
//!
//! let service = MockConversionService::new();
//! service
//!     .script_batch_status("batch-1", vec![fixtures::batch_report(BatchStatus::Completed, &[])])
//!     .await;
//! ```

mod mock_service;

pub use mock_service::{MockCall, MockConversionService};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::service::{BatchItemReport, BatchStatus, BatchStatusReport, FileUpload, ItemStatus};

    use super::MockConversionService;

    /// A small CSV upload.
    pub fn csv_file(name: &str) -> FileUpload {
        FileUpload::new(name, b"id,name\n1,alpha\n2,beta\n".to_vec())
    }

    /// A batch item as the mock service would name it.
    pub fn batch_item(file_name: &str, status: ItemStatus) -> BatchItemReport {
        BatchItemReport {
            id: MockConversionService::item_id(file_name),
            original_filename: file_name.to_string(),
            status,
            source_format: file_name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()),
            output_filename: None,
            error_message: None,
        }
    }

    /// A failed batch item with a reason.
    pub fn failed_item(file_name: &str, reason: &str) -> BatchItemReport {
        BatchItemReport {
            error_message: Some(reason.to_string()),
            ..batch_item(file_name, ItemStatus::Failed)
        }
    }

    /// A batch status report whose counters are derived from `items`.
    pub fn batch_report(status: BatchStatus, items: &[BatchItemReport]) -> BatchStatusReport {
        let count = |wanted: ItemStatus| items.iter().filter(|i| i.status == wanted).count() as u32;
        BatchStatusReport {
            batch_job_id: None,
            status,
            target_format: Some("json".to_string()),
            total_items: items.len() as u32,
            completed_items: count(ItemStatus::Completed),
            failed_items: count(ItemStatus::Failed),
            items: items.to_vec(),
        }
    }
}
