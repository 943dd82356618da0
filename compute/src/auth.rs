//! Login primitives.
//!
//! An [`Authenticator`] obtains tokens; it never touches the session. The
//! client decides which endpoint to call for the configured
//! [`AuthMode`](crate::session::AuthMode) and stores what comes back.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{ComputeError, ComputeResult};
use crate::session::MANAGEMENT_AUTH_HEADER;
use crate::transport::RetryingTransport;

/// Issues and extends session tokens.
///
/// Implemented over HTTP by [`HttpAuthenticator`]; tests substitute their own.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtain a fresh token from `url`.
    async fn login(&self, url: &Url) -> ComputeResult<SecretString>;

    /// Exchange a live token for one with a renewed lifetime.
    async fn extend(&self, url: &Url, token: &SecretString) -> ComputeResult<SecretString>;
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Username/password login against the platform.
pub struct HttpAuthenticator {
    transport: RetryingTransport,
    identity: String,
    secret: SecretString,
}

impl std::fmt::Debug for HttpAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthenticator")
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpAuthenticator {
    /// Create an authenticator sending through `transport`.
    #[must_use]
    pub fn new(transport: RetryingTransport, identity: impl Into<String>, secret: SecretString) -> Self {
        Self {
            transport,
            identity: identity.into(),
            secret,
        }
    }

    async fn read_token(url: &Url, response: Response) -> ComputeResult<SecretString> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ComputeError::auth_failed(url.as_str(), status.as_u16(), body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|_| {
            ComputeError::auth_failed(url.as_str(), status.as_u16(), "response did not contain a token")
        })?;
        Ok(SecretString::from(parsed.token))
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    #[instrument(skip(self), fields(url = %url, identity = %self.identity))]
    async fn login(&self, url: &Url) -> ComputeResult<SecretString> {
        let body = serde_json::json!({
            "username": self.identity,
            "password": self.secret.expose_secret(),
        });

        let response = self
            .transport
            .send(
                self.transport
                    .request(Method::POST, url.clone())
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body),
            )
            .await?;

        let token = Self::read_token(url, response).await?;
        info!("logged in");
        Ok(token)
    }

    #[instrument(skip(self, token), fields(url = %url))]
    async fn extend(&self, url: &Url, token: &SecretString) -> ComputeResult<SecretString> {
        let response = self
            .transport
            .send(
                self.transport
                    .request(Method::GET, url.clone())
                    .header(CONTENT_TYPE, "application/json")
                    .header(MANAGEMENT_AUTH_HEADER, token.expose_secret()),
            )
            .await?;

        let token = Self::read_token(url, response).await?;
        debug!("session extended");
        Ok(token)
    }
}
