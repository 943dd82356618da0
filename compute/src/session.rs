//! Session state shared by the authenticator and the request engine.
//!
//! A [`Session`] is owned by one client. Only the login paths write the
//! token; the engine reads it to build headers and to decide when the
//! session has to be extended.

use std::fmt;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use rust_common::RetryConfig;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;
use url::Url;

use crate::config::ComputeConfig;
use crate::error::{ComputeError, ComputeResult};

/// Header carrying the raw management-plane token.
pub const MANAGEMENT_AUTH_HEADER: &str = "x-redlock-auth";

static INSECURE_TLS_NOTICE: Once = Once::new();

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic time.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How the client authenticates, fixed when the session is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Log in through the management plane; tokens travel in `x-redlock-auth`.
    Management {
        /// Management-plane base URL
        base: Url,
    },
    /// Log in against the Compute console; tokens travel as bearer tokens.
    Workload {
        /// Workload-plane base URL
        base: Url,
    },
}

impl AuthMode {
    /// Pick the mode: management whenever its URL is set, else workload.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::MissingBaseUrl`] when neither URL is set.
    pub fn select(management: Option<&Url>, compute: Option<&Url>) -> ComputeResult<Self> {
        match (management, compute) {
            (Some(base), _) => Ok(Self::Management { base: base.clone() }),
            (None, Some(base)) => Ok(Self::Workload { base: base.clone() }),
            (None, None) => Err(ComputeError::MissingBaseUrl),
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Management { .. } => "management",
            Self::Workload { .. } => "workload",
        }
    }

    /// Endpoint that issues a fresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the login path cannot be joined to the base URL.
    pub fn login_url(&self) -> ComputeResult<Url> {
        match self {
            Self::Management { base } => join_endpoint(base, "login"),
            Self::Workload { base } => join_endpoint(base, "api/v1/authenticate"),
        }
    }

    /// Endpoint that extends a live token; workload mode has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the extend path cannot be joined to the base URL.
    pub fn extend_url(&self) -> ComputeResult<Option<Url>> {
        match self {
            Self::Management { base } => join_endpoint(base, "auth_token/extend").map(Some),
            Self::Workload { .. } => Ok(None),
        }
    }

    /// Header carrying `token` in this mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn auth_header(&self, token: &SecretString) -> ComputeResult<(HeaderName, HeaderValue)> {
        let (name, raw) = match self {
            Self::Management { .. } => (
                HeaderName::from_static(MANAGEMENT_AUTH_HEADER),
                token.expose_secret().to_string(),
            ),
            Self::Workload { .. } => (AUTHORIZATION, format!("Bearer {}", token.expose_secret())),
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|_| ComputeError::config("token contains characters not allowed in a header"))?;
        value.set_sensitive(true);
        Ok((name, value))
    }
}

/// Parse a base URL. Bare hosts get `https://`; the path always ends in `/`
/// so endpoints join beneath it.
///
/// # Errors
///
/// Returns [`ComputeError::InvalidUrl`] if the input is not a URL.
pub fn parse_base_url(raw: &str) -> ComputeResult<Url> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let mut url = Url::parse(&candidate).map_err(|e| ComputeError::invalid_url(raw, e))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolve an endpoint path (optionally with its own query) against a base.
///
/// # Errors
///
/// Returns [`ComputeError::InvalidUrl`] if the endpoint cannot be joined.
pub fn join_endpoint(base: &Url, endpoint: &str) -> ComputeResult<Url> {
    base.join(endpoint.trim_start_matches('/'))
        .map_err(|e| ComputeError::invalid_url(endpoint, e))
}

/// Per-client session state.
pub struct Session {
    mode: AuthMode,
    compute_base: Option<Url>,
    token: Option<SecretString>,
    token_acquired_at: Option<Instant>,
    token_ttl: Duration,
    tls_verify: bool,
    retry: RetryConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode.name())
            .field("compute_base", &self.compute_base.as_ref().map(Url::as_str))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("token_acquired_at", &self.token_acquired_at)
            .field("token_ttl", &self.token_ttl)
            .field("tls_verify", &self.tls_verify)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from configuration, choosing the auth mode once.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::MissingBaseUrl`] when no base URL is set, or
    /// [`ComputeError::InvalidUrl`] when one cannot be parsed.
    pub fn from_config(config: &ComputeConfig) -> ComputeResult<Self> {
        let management = config.management_url.as_deref().map(parse_base_url).transpose()?;
        let compute = config.compute_url.as_deref().map(parse_base_url).transpose()?;
        let mode = AuthMode::select(management.as_ref(), compute.as_ref())?;

        Ok(Self {
            mode,
            compute_base: compute,
            token: None,
            token_acquired_at: None,
            token_ttl: config.token_ttl,
            tls_verify: config.tls_verify,
            retry: config.retry.clone(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to age tokens.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Authentication mode.
    #[must_use]
    pub const fn mode(&self) -> &AuthMode {
        &self.mode
    }

    /// Compute base URL, required by every engine request.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::MissingComputeUrl`] when it is not configured.
    pub fn compute_base(&self) -> ComputeResult<&Url> {
        self.compute_base.as_ref().ok_or(ComputeError::MissingComputeUrl)
    }

    /// Whether a token has been obtained.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Current token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Time since the current token was obtained.
    #[must_use]
    pub fn token_age(&self) -> Option<Duration> {
        self.token_acquired_at
            .map(|at| self.clock.now().saturating_duration_since(at))
    }

    /// Whether the token has outlived its TTL.
    #[must_use]
    pub fn token_expired(&self) -> bool {
        self.token_age().is_some_and(|age| age > self.token_ttl)
    }

    /// Token lifetime.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// TLS verification setting.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Retry configuration.
    #[must_use]
    pub const fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Auth header for the current token, if one is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value.
    pub fn auth_header(&self) -> ComputeResult<Option<(HeaderName, HeaderValue)>> {
        self.token
            .as_ref()
            .map(|token| self.mode.auth_header(token))
            .transpose()
    }

    /// Store a freshly issued token and restart its clock.
    pub(crate) fn store_token(&mut self, token: SecretString) {
        self.token = Some(token);
        self.token_acquired_at = Some(self.clock.now());
    }

    /// Emit the insecure-TLS warning, once per process.
    pub fn warn_if_insecure(&self) {
        if !self.tls_verify {
            INSECURE_TLS_NOTICE.call_once(|| {
                warn!("TLS certificate verification is disabled for the compute API");
            });
        }
    }
}
