pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod poller;
pub mod service;
pub mod session;
pub mod testing;
pub mod upload;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    OutputConfig, ServiceConfig,
};
pub use error::{ClientError, ValidationError};
pub use events::{EventEnvelope, EventSink, LineOutcome, ProgressEvent, StatusLine};
pub use format::{resolve_source_format, FileFormat};
pub use poller::{
    BatchCompletion, BatchProgress, CancelHandle, PollDriver, PollOutcome, PollState,
    PollingConfig, Schedule, TaskCompletion,
};
pub use service::{
    ConversionService, Download, DownloadRef, FileUpload, HttpConversionService, ServiceError,
};
pub use session::{BatchPhase, BatchSession, TaskSession, Workspace};
pub use upload::{ItemRegistry, ProvisionalKey, SingleSubmission};
