use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::poller::PollingConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Conversion service endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service base URL (e.g., "http://localhost:8082")
    #[serde(default = "default_url")]
    pub url: String,
    /// Prefix for single-file conversion endpoints
    #[serde(default = "default_convert_path")]
    pub convert_path: String,
    /// Prefix for batch endpoints
    #[serde(default = "default_batch_path")]
    pub batch_path: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            convert_path: default_convert_path(),
            batch_path: default_batch_path(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_convert_path() -> String {
    "/api/convert".to_string()
}

fn default_batch_path() -> String {
    "/api/batch".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Where downloaded results are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
