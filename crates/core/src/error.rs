//! Error taxonomy shared by the single and batch flows.

use thiserror::Error;

use crate::service::ServiceError;

/// Input problems caught before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a file to convert")]
    NoFileSelected,

    #[error("Please select a target format")]
    MissingTargetFormat,

    #[error("Could not detect the format of '{file_name}'. Please select a source format manually")]
    UnrecognizedExtension { file_name: String },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Please create a batch job first")]
    NoActiveBatch,

    #[error("Please upload at least one file")]
    NothingUploaded,

    #[error("No converted output is available to download")]
    NothingToDownload,
}

/// Any failure surfaced by a client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network failure or non-success response.
    #[error(transparent)]
    Transport(#[from] ServiceError),

    /// The service reported a terminal error for a task or batch.
    #[error("Conversion of {subject} failed: {message}")]
    Conversion { subject: String, message: String },

    /// Polling was stopped before reaching a terminal status.
    #[error("Cancelled")]
    Cancelled,
}

impl ClientError {
    /// Creates a conversion error.
    pub fn conversion(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Whether a poll may be retried after this error.
    ///
    /// Only transient transport failures qualify; validation and conversion
    /// errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_transient())
    }
}
