//! Compute client configuration.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use rust_common::{HttpConfig, RetryConfig};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{ComputeError, ComputeResult};

/// Compute client configuration.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    /// Management-plane (CSPM) API base URL
    pub management_url: Option<String>,
    /// Workload-plane (Compute) API base URL
    pub compute_url: Option<String>,
    /// Login identity (access key or username)
    pub identity: String,
    /// Login secret
    pub secret: SecretString,
    /// Verify the server's TLS certificate
    pub tls_verify: bool,
    /// Retry policy for transient statuses
    pub retry: RetryConfig,
    /// How long a token is used before the session is extended
    pub token_ttl: Duration,
    /// HTTP client settings
    pub http: HttpConfig,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            management_url: None,
            compute_url: None,
            identity: String::new(),
            secret: SecretString::from(String::new()),
            tls_verify: true,
            retry: RetryConfig::default(),
            token_ttl: Duration::from_secs(590),
            http: HttpConfig::default(),
        }
    }
}

impl ComputeConfig {
    /// Create a configuration with credentials and defaults elsewhere.
    #[must_use]
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: SecretString::from(secret.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables (and `.env`).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> ComputeResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, using the same
    /// variable names as [`Self::from_env`].
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ComputeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut retry = defaults.retry.clone();
        if let Some(codes) = non_empty("PC_RETRY_STATUS_CODES") {
            retry = retry.with_status_codes(parse_status_codes(&codes)?);
        }
        if let Some(limit) = non_empty("PC_RETRY_LIMIT") {
            retry = retry.with_max_attempts(parse_value("PC_RETRY_LIMIT", &limit)?);
        }
        if let Some(pause) = non_empty("PC_RETRY_PAUSE_SECS") {
            retry = retry.with_pause(Duration::from_secs(parse_value("PC_RETRY_PAUSE_SECS", &pause)?));
        }

        let tls_verify = match non_empty("PC_TLS_VERIFY") {
            Some(raw) => parse_bool("PC_TLS_VERIFY", &raw)?,
            None => defaults.tls_verify,
        };
        let token_ttl = match non_empty("PC_TOKEN_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_value("PC_TOKEN_TTL_SECS", &raw)?),
            None => defaults.token_ttl,
        };
        let mut http = defaults.http.clone();
        if let Some(raw) = non_empty("PC_TIMEOUT_SECS") {
            http = http.with_timeout(Duration::from_secs(parse_value("PC_TIMEOUT_SECS", &raw)?));
        }

        Ok(Self {
            management_url: non_empty("CSPM_URL"),
            compute_url: non_empty("CWP_URL"),
            identity: lookup("PC_IDENTITY").unwrap_or_default(),
            secret: SecretString::from(lookup("PC_SECRET").unwrap_or_default()),
            tls_verify,
            retry,
            token_ttl,
            http: http.with_tls_verify(tls_verify),
        })
    }

    /// Load configuration from a JSON settings file.
    ///
    /// The file holds `url`, `url_compute`, `identity`, `secret` and
    /// `verify`; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> ComputeResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ComputeError::config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Parse the JSON settings format used by [`Self::from_json_file`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid settings document.
    pub fn from_json_str(raw: &str) -> ComputeResult<Self> {
        let settings: SettingsFile = serde_json::from_str(raw)?;
        let tls_verify = settings.verify.unwrap_or(true);
        Ok(Self {
            management_url: settings.url.filter(|u| !u.trim().is_empty()),
            compute_url: settings.url_compute.filter(|u| !u.trim().is_empty()),
            identity: settings.identity.unwrap_or_default(),
            secret: SecretString::from(settings.secret.unwrap_or_default()),
            tls_verify,
            http: HttpConfig::default().with_tls_verify(tls_verify),
            ..Default::default()
        })
    }

    /// Set the management-plane base URL.
    #[must_use]
    pub fn with_management_url(mut self, url: impl Into<String>) -> Self {
        self.management_url = Some(url.into());
        self
    }

    /// Set the workload-plane base URL.
    #[must_use]
    pub fn with_compute_url(mut self, url: impl Into<String>) -> Self {
        self.compute_url = Some(url.into());
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self.http.tls_verify = verify;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the token lifetime.
    #[must_use]
    pub const fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    url: Option<String>,
    url_compute: Option<String>,
    identity: Option<String>,
    secret: Option<String>,
    verify: Option<bool>,
}

fn parse_value<T>(name: &str, raw: &str) -> ComputeResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ComputeError::config(format!("Invalid {name}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> ComputeResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ComputeError::config(format!("Invalid {name}: {other}"))),
    }
}

/// Parse a comma-separated list of HTTP status codes.
fn parse_status_codes(raw: &str) -> ComputeResult<BTreeSet<u16>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let code: u16 = parse_value("PC_RETRY_STATUS_CODES", s)?;
            if (100..600).contains(&code) {
                Ok(code)
            } else {
                Err(ComputeError::config(format!(
                    "Invalid PC_RETRY_STATUS_CODES: {code} is not an HTTP status"
                )))
            }
        })
        .collect()
}
