//! Convenience wrappers for common Compute endpoints.

use serde_json::Value;

use crate::client::{ComputeClient, ComputeRequest};
use crate::error::ComputeResult;

fn into_items(result: Option<Value>) -> Vec<Value> {
    match result {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

impl ComputeClient {
    /// Daily usage statistics.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub async fn stats_daily(&mut self) -> ComputeResult<Vec<Value>> {
        self.execute(&ComputeRequest::get("api/v1/stats/daily"))
            .await
            .map(into_items)
    }

    /// Resource collections.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub async fn collections(&mut self) -> ComputeResult<Vec<Value>> {
        self.execute(&ComputeRequest::get("api/v1/collections"))
            .await
            .map(into_items)
    }

    /// Every scanned host.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub async fn hosts(&mut self) -> ComputeResult<Vec<Value>> {
        self.list("api/v1/hosts").await
    }

    /// Every scanned image.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub async fn images(&mut self) -> ComputeResult<Vec<Value>> {
        self.list("api/v1/images").await
    }

    /// Every running container.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub async fn containers(&mut self) -> ComputeResult<Vec<Value>> {
        self.list("api/v1/containers").await
    }

    /// Every deployed defender, optionally filtered by connection state.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub async fn defenders(&mut self, connected: Option<bool>) -> ComputeResult<Vec<Value>> {
        let mut request = ComputeRequest::get("api/v1/defenders").paginated();
        if let Some(connected) = connected {
            request = request.query("connected", connected.to_string());
        }
        self.execute(&request).await.map(into_items)
    }

    async fn list(&mut self, endpoint: &str) -> ComputeResult<Vec<Value>> {
        self.execute(&ComputeRequest::get(endpoint).paginated())
            .await
            .map(into_items)
    }
}
