//! Compute client error types using thiserror 2.0.
//!
//! Every failure the engine does not tolerate ends up here. Each variant
//! maps to the status code the error reporter prints.

use rust_common::PlatformError;
use thiserror::Error;

/// Status reported when neither base URL is configured.
pub const MISSING_BASE_URL_STATUS: u16 = 418;

/// Status reported for local failures that carry no HTTP status.
pub const INTERNAL_STATUS: u16 = 500;

/// Compute client errors.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Neither a management-plane nor a workload-plane base URL is set
    #[error("Specify a management or workload-plane API base URL")]
    MissingBaseUrl,

    /// A request needs the Compute base URL but none is configured
    #[error("Please specify a Compute API base URL")]
    MissingComputeUrl,

    /// A base URL or endpoint could not be parsed
    #[error("Invalid URL {input}: {source}")]
    InvalidUrl {
        /// The offending input
        input: String,
        /// Parser failure
        #[source]
        source: url::ParseError,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Login or login extension was rejected
    #[error("Login ({url}) responded with an error and this response:\n{body}")]
    AuthenticationFailed {
        /// Login endpoint
        url: String,
        /// HTTP status of the login response
        status: u16,
        /// Raw response text
        body: String,
    },

    /// The API answered with a non-success status after all retries
    #[error("API ({url}) responded with an error and this response:\n{body}")]
    Api {
        /// Request URL
        url: String,
        /// HTTP status of the final attempt
        status: u16,
        /// Raw response text
        body: String,
    },

    /// A response body did not match the expected type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport or client construction failure
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for compute client operations.
pub type ComputeResult<T> = Result<T, ComputeError>;

impl ComputeError {
    /// Status code printed by the error reporter.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingBaseUrl => MISSING_BASE_URL_STATUS,
            Self::AuthenticationFailed { status, .. } | Self::Api { status, .. } => *status,
            Self::MissingComputeUrl
            | Self::InvalidUrl { .. }
            | Self::InvalidConfig(_)
            | Self::Serialization(_)
            | Self::Platform(_) => INTERNAL_STATUS,
        }
    }

    /// Whether the request never got a response (connection failure or
    /// timeout).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Platform(err) if err.is_transport())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an API error from the final response of a request.
    #[must_use]
    pub fn api(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth_failed(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Create an invalid URL error.
    #[must_use]
    pub fn invalid_url(input: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for ComputeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Platform(PlatformError::from(err))
    }
}
