//! Request engine for the Compute API.
//!
//! [`ComputeClient::execute`] logs in on first use, extends the session
//! whenever the token outlives its TTL (checked before every page), sends
//! each page through the retrying transport and accumulates paginated
//! results. Fatal failures come back as `Err`; tolerated failures and
//! unreadable bodies come back as `Ok(None)`.

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::auth::{Authenticator, HttpAuthenticator};
use crate::config::ComputeConfig;
use crate::error::{ComputeError, ComputeResult};
use crate::pagination::{PageAccumulator, TotalCount, total_count};
use crate::session::{Clock, Session, join_endpoint};
use crate::transport::RetryingTransport;

/// One call to the engine.
#[derive(Debug, Clone)]
pub struct ComputeRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    tolerate_failure: bool,
    paginated: bool,
}

impl ComputeRequest {
    /// Request `endpoint` (relative to the Compute base URL) with `method`.
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            tolerate_failure: false,
            paginated: false,
        }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Log and swallow terminal failures instead of returning them.
    #[must_use]
    pub const fn tolerate_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    /// Walk every page of a `Total-Count` endpoint.
    #[must_use]
    pub const fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Endpoint path.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether terminal failures are tolerated.
    #[must_use]
    pub const fn tolerates_failure(&self) -> bool {
        self.tolerate_failure
    }

    /// Whether the request is paginated.
    #[must_use]
    pub const fn is_paginated(&self) -> bool {
        self.paginated
    }

    /// Build the URL: the endpoint's own query first, then the caller's
    /// parameters, then the page window.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be joined to `base`.
    pub fn url(&self, base: &Url, page: Option<&PageAccumulator>) -> ComputeResult<Url> {
        let mut url = join_endpoint(base, &self.endpoint)?;
        if !self.query.is_empty() || page.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
            if let Some(page) = page {
                for (key, value) in page.window() {
                    pairs.append_pair(key, &value);
                }
            }
        }
        Ok(url)
    }
}

/// Authenticated Compute API client.
pub struct ComputeClient {
    session: Session,
    auth: Arc<dyn Authenticator>,
    transport: RetryingTransport,
}

impl std::fmt::Debug for ComputeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeClient")
            .field("session", &self.session)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl ComputeClient {
    /// Create a client that logs in with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::MissingBaseUrl`] when no base URL is set, or
    /// an error if a URL or the HTTP client is invalid.
    pub fn new(config: &ComputeConfig) -> ComputeResult<Self> {
        let transport = Self::transport_for(config)?;
        let auth = Arc::new(HttpAuthenticator::new(
            transport.clone(),
            config.identity.clone(),
            config.secret.clone(),
        ));
        Self::assemble(config, auth, transport)
    }

    /// Create a client with a custom [`Authenticator`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_authenticator(
        config: &ComputeConfig,
        auth: Arc<dyn Authenticator>,
    ) -> ComputeResult<Self> {
        let transport = Self::transport_for(config)?;
        Self::assemble(config, auth, transport)
    }

    fn transport_for(config: &ComputeConfig) -> ComputeResult<RetryingTransport> {
        let http = config.http.clone().with_tls_verify(config.tls_verify);
        RetryingTransport::new(&http, config.retry.clone())
    }

    fn assemble(
        config: &ComputeConfig,
        auth: Arc<dyn Authenticator>,
        transport: RetryingTransport,
    ) -> ComputeResult<Self> {
        Ok(Self {
            session: Session::from_config(config)?,
            auth,
            transport,
        })
    }

    /// Replace the clock used to age tokens.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.session = self.session.with_clock(clock);
        self
    }

    /// Session state.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Log in for the configured mode and store the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the login is rejected or cannot be sent.
    #[instrument(skip(self), fields(mode = self.session.mode().name()))]
    pub async fn login(&mut self) -> ComputeResult<()> {
        let url = self.session.mode().login_url()?;
        let token = self.auth.login(&url).await?;
        self.session.store_token(token);
        Ok(())
    }

    /// Extend the session. Workload mode has no extend endpoint and logs in
    /// again instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension or login fails.
    #[instrument(skip(self), fields(mode = self.session.mode().name()))]
    pub async fn extend_login(&mut self) -> ComputeResult<()> {
        let Some(url) = self.session.mode().extend_url()? else {
            return self.login().await;
        };
        let Some(current) = self.session.token().cloned() else {
            return self.login().await;
        };
        let token = self.auth.extend(&url, &current).await?;
        self.session.store_token(token);
        Ok(())
    }

    /// Execute a request.
    ///
    /// Returns the parsed body for single-object responses, the concatenated
    /// items (a JSON array) for `Total-Count` responses, and `None` when the
    /// body is not JSON or when a tolerated request fails.
    ///
    /// # Errors
    ///
    /// Returns an error when a non-tolerated request fails after retries, or
    /// when configuration or login fails.
    #[instrument(
        skip(self, request),
        fields(method = %request.method, endpoint = %request.endpoint, paginated = request.paginated)
    )]
    pub async fn execute(&mut self, request: &ComputeRequest) -> ComputeResult<Option<Value>> {
        self.session.warn_if_insecure();
        let base = self.session.compute_base()?.clone();
        if !self.session.has_token() {
            self.login().await?;
        }

        let mut pages = PageAccumulator::default();
        loop {
            if self.session.token_expired() {
                debug!(offset = pages.offset(), "token expired, extending session");
                self.extend_login().await?;
            }

            let url = request.url(&base, request.paginated.then_some(&pages))?;
            let builder = self.build(request, url.clone())?;

            let response = match self.transport.send(builder).await {
                Ok(response) => response,
                Err(err) if request.tolerate_failure => {
                    if err.is_transport() {
                        error!(
                            url = %url,
                            error = %err,
                            query = ?request.query,
                            body = ?request.body,
                            "API request got no response"
                        );
                    } else {
                        error!(url = %url, error = %err, "API request could not be sent");
                    }
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                if request.tolerate_failure {
                    error!(
                        url = %url,
                        status = status.as_u16(),
                        query = ?request.query,
                        body = ?request.body,
                        "API responded with an error"
                    );
                    return Ok(None);
                }
                return Err(ComputeError::api(url.as_str(), status.as_u16(), text));
            }

            let total = total_count(response.headers());
            let Some(body) = Self::read_json(&url, request, response).await else {
                return Ok(None);
            };

            match total {
                TotalCount::Absent => return Ok(Some(body)),
                TotalCount::Invalid => {
                    error!(url = %url, "API responded with an unreadable Total-Count header");
                    return Ok(None);
                }
                TotalCount::Total(total) => {
                    pages.record(total, body);
                    debug!(total, collected = pages.items().len(), "page received");
                    if !request.paginated || !pages.has_more() {
                        break;
                    }
                }
            }
        }

        let items = pages.into_items();
        info!(items = items.len(), "request complete");
        Ok(Some(Value::Array(items)))
    }

    /// Execute a request and deserialize the result.
    ///
    /// # Errors
    ///
    /// Same as [`Self::execute`], plus a serialization error if the result
    /// does not match `T`.
    pub async fn execute_as<T: DeserializeOwned>(
        &mut self,
        request: &ComputeRequest,
    ) -> ComputeResult<Option<T>> {
        self.execute(request)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(ComputeError::from)
    }

    fn build(&self, request: &ComputeRequest, url: Url) -> ComputeResult<RequestBuilder> {
        // An absent body is still sent, as the JSON literal `null`.
        let body = serde_json::to_vec(&request.body)?;
        let mut builder = self
            .transport
            .request(request.method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some((name, value)) = self.session.auth_header()? {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }

    async fn read_json(url: &Url, request: &ComputeRequest, response: Response) -> Option<Value> {
        let parsed = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(err) => {
                debug!(error = %err, "failed to read response body");
                None
            }
        };
        if parsed.is_none() {
            error!(
                url = %url,
                query = ?request.query,
                body = ?request.body,
                "API responded with no usable response"
            );
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        crate::session::parse_base_url("cwp.example.com").unwrap()
    }

    #[test]
    fn test_url_without_extras() {
        let url = ComputeRequest::get("api/v1/stats/daily").url(&base(), None).unwrap();
        assert_eq!(url.as_str(), "https://cwp.example.com/api/v1/stats/daily");
    }

    #[test]
    fn test_url_merges_query_and_window() {
        let mut pages = PageAccumulator::default();
        pages.record(200, json!([]));
        let url = ComputeRequest::get("api/v1/hosts?project=central")
            .query("collections", "prod")
            .paginated()
            .url(&base(), Some(&pages))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cwp.example.com/api/v1/hosts?project=central&collections=prod&limit=50&offset=50"
        );
    }

    #[test]
    fn test_url_with_trailing_question_mark() {
        let pages = PageAccumulator::default();
        let url = ComputeRequest::get("api/v1/images?")
            .url(&base(), Some(&pages))
            .unwrap();
        assert_eq!(url.query(), Some("limit=50&offset=0"));
    }

    #[test]
    fn test_request_builder_flags() {
        let request = ComputeRequest::new(Method::POST, "api/v1/scans")
            .body(json!({"hostname": "h1"}))
            .tolerate_failure()
            .paginated();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.endpoint(), "api/v1/scans");
        assert!(request.tolerates_failure());
        assert!(request.is_paginated());
    }
}
