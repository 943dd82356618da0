//! Retrying HTTP transport.
//!
//! Replays a buffered request under the shared [`RetryPolicy`]. URLs and
//! headers never change between attempts.

use reqwest::{Client, RequestBuilder, Response};
use rust_common::{HttpConfig, PlatformError, RetryConfig, RetryPolicy, build_http_client};
use tracing::debug;

use crate::error::ComputeResult;

/// HTTP client plus retry policy.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Build a transport from HTTP and retry settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(http: &HttpConfig, retry: RetryConfig) -> ComputeResult<Self> {
        let client = build_http_client(http)?;
        Ok(Self::from_client(client, retry))
    }

    /// Wrap an existing reqwest client.
    #[must_use]
    pub const fn from_client(client: Client, retry: RetryConfig) -> Self {
        Self {
            client,
            policy: RetryPolicy::new(retry),
        }
    }

    /// Start a request on the underlying client.
    pub fn request(&self, method: reqwest::Method, url: url::Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send `builder`, retrying on configured statuses.
    ///
    /// The body must be buffered so the request can be cloned per attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be cloned or built, or if the
    /// transport fails before a response arrives.
    pub async fn send(&self, builder: RequestBuilder) -> ComputeResult<Response> {
        let mut attempt = 0u32;
        let response = self
            .policy
            .execute(|| {
                attempt += 1;
                let next = builder.try_clone().ok_or_else(|| {
                    PlatformError::internal(
                        "request body cannot be cloned; buffer the body to enable retries",
                    )
                });
                let client = self.client.clone();
                async move {
                    let request = next?.build()?;
                    debug!(attempt, method = %request.method(), url = %request.url(), "sending request");
                    let response = client.execute(request).await?;
                    debug!(attempt, status = %response.status(), "received response");
                    Ok::<_, PlatformError>(response)
                }
            })
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(attempts: u32) -> RetryingTransport {
        RetryingTransport::new(
            &HttpConfig::default(),
            RetryConfig::default()
                .with_max_attempts(attempts)
                .with_pause(Duration::ZERO),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_retries_configured_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .and(header("x-probe", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(3);
        let url = url::Url::parse(&format!("{}/flaky", server.uri())).unwrap();
        let response = transport
            .send(transport.request(reqwest::Method::GET, url).header("x-probe", "1"))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_returns_last_failure_when_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let transport = transport(2);
        let url = url::Url::parse(&server.uri()).unwrap();
        let response = transport
            .send(transport.request(reqwest::Method::POST, url).body("null"))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_connection_failure_is_an_error() {
        let transport = transport(3);
        let url = url::Url::parse("http://127.0.0.1:1/unreachable").unwrap();
        let result = transport.send(transport.request(reqwest::Method::GET, url)).await;
        let err = result.unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(
            err,
            crate::ComputeError::Platform(PlatformError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = RetryingTransport::new(
            &HttpConfig::default().with_timeout(Duration::from_millis(100)),
            RetryConfig::default().with_max_attempts(1),
        )
        .unwrap();
        let url = url::Url::parse(&server.uri()).unwrap();
        let err = transport
            .send(transport.request(reqwest::Method::GET, url))
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert!(matches!(
            err,
            crate::ComputeError::Platform(PlatformError::Timeout(_))
        ));
    }
}
