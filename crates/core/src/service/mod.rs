//! Conversion service abstraction.
//!
//! This module provides a `ConversionService` trait describing the remote
//! HTTP API, plus the reqwest-backed implementation used in production.

mod http;
mod types;

pub use http::HttpConversionService;
pub use types::*;
