//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use compute_client::{Authenticator, Clock, ComputeClient, ComputeConfig, ComputeError, ComputeResult};
use rust_common::RetryConfig;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

/// Authenticator that hands out numbered tokens and records its calls.
#[derive(Debug, Default)]
pub struct ScriptedAuthenticator {
    logins: AtomicUsize,
    extends: AtomicUsize,
    calls: Mutex<Vec<String>>,
    reject_with: Option<u16>,
}

impl ScriptedAuthenticator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(status: u16) -> Arc<Self> {
        Arc::new(Self {
            reject_with: Some(status),
            ..Self::default()
        })
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn extends(&self) -> usize {
        self.extends.load(Ordering::SeqCst)
    }

    /// URLs called, in order, prefixed with `login ` or `extend `.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    async fn login(&self, url: &Url) -> ComputeResult<SecretString> {
        self.calls.lock().unwrap().push(format!("login {url}"));
        if let Some(status) = self.reject_with {
            return Err(ComputeError::auth_failed(url.as_str(), status, "bad credentials"));
        }
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SecretString::from(format!("login-{n}")))
    }

    async fn extend(&self, url: &Url, _token: &SecretString) -> ComputeResult<SecretString> {
        self.calls.lock().unwrap().push(format!("extend {url}"));
        let n = self.extends.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SecretString::from(format!("extend-{n}")))
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<Instant>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Instant::now())))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

/// Retries without pauses.
pub fn fast_retry(attempts: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_attempts(attempts)
        .with_pause(Duration::ZERO)
}

/// Workload-plane configuration against a mock server.
pub fn workload_config(uri: &str) -> ComputeConfig {
    ComputeConfig::new("svc", "pw")
        .with_compute_url(uri)
        .with_retry(fast_retry(3))
        .with_timeout(Duration::from_secs(5))
}

/// Management-plane configuration; both planes served by the mock server.
pub fn management_config(uri: &str) -> ComputeConfig {
    workload_config(uri).with_management_url(uri)
}

/// Client with a scripted authenticator.
pub fn scripted_client(config: &ComputeConfig, auth: &Arc<ScriptedAuthenticator>) -> ComputeClient {
    ComputeClient::with_authenticator(config, auth.clone()).unwrap()
}

/// `len` items numbered from `start`.
pub fn items(start: u64, len: u64) -> Value {
    Value::Array((start..start + len).map(|i| json!({ "_id": i })).collect())
}
