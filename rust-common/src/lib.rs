//! Shared plumbing for the compute API client.
//!
//! This crate provides centralized implementations for:
//! - Error types for transport and client construction failures
//! - HTTP client configuration and building (timeouts, TLS verification)
//! - Status-code driven retry with a fixed pause between attempts
//! - Tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, build_http_client};
pub use retry::{RetryConfig, RetryPolicy, StatusCoded};
pub use tracing_config::{TracingConfig, init_tracing};
