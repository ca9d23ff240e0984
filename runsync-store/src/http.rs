//! HTTP store adapter
//!
//! REST adapter for a remote API server holding both the declarative
//! records and the engine's run resources. Maps status codes onto the
//! [`StoreError`] taxonomy: 404 is NotFound, 409 is Conflict on updates and
//! AlreadyExists on creates, anything else non-2xx is an API error.

use async_trait::async_trait;
use reqwest::Client;
use runsync_core::domain::record::{PipelineRun, RecordKey};
use runsync_core::domain::run::EngineRun;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{EngineRunStore, RecordLister, RecordStore};

/// HTTP client for the record and engine-run APIs
#[derive(Debug, Clone)]
pub struct HttpStore {
    /// Base URL of the API server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl HttpStore {
    /// Create a new HTTP store
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new HTTP store with a custom HTTP client
    ///
    /// This allows configuring timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the API server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn record_url(&self, key: &RecordKey) -> String {
        format!(
            "{}/apis/runsync/v1/namespaces/{}/pipelineruns/{}",
            self.base_url, key.namespace, key.name
        )
    }

    fn run_url(&self, key: &RecordKey) -> String {
        format!(
            "{}/apis/engine/v1/namespaces/{}/runs/{}",
            self.base_url, key.namespace, key.name
        )
    }

    /// Handle an API response and deserialize JSON
    ///
    /// Expects operation-specific statuses (404, 409) to have been handled
    /// by the caller already.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Parse(format!("failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[async_trait]
impl RecordStore for HttpStore {
    async fn get(&self, key: &RecordKey) -> Result<PipelineRun> {
        debug!(record = %key, "fetching record");
        let response = self.client.get(self.record_url(key)).send().await?;

        if response.status().as_u16() == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.handle_response(response).await
    }

    async fn update(&self, run: &PipelineRun) -> Result<PipelineRun> {
        let key = run.key();
        debug!(record = %key, version = run.meta.resource_version, "updating record");
        let response = self
            .client
            .put(self.record_url(&key))
            .json(run)
            .send()
            .await?;

        match response.status().as_u16() {
            404 => Err(StoreError::NotFound(key.to_string())),
            409 => Err(StoreError::Conflict(key.to_string())),
            _ => self.handle_response(response).await,
        }
    }
}

#[async_trait]
impl EngineRunStore for HttpStore {
    async fn get(&self, key: &RecordKey) -> Result<EngineRun> {
        debug!(run = %key, "fetching engine run");
        let response = self.client.get(self.run_url(key)).send().await?;

        if response.status().as_u16() == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.handle_response(response).await
    }

    async fn create(&self, run: &EngineRun) -> Result<EngineRun> {
        let key = run.key();
        debug!(run = %key, "creating engine run");
        let url = format!(
            "{}/apis/engine/v1/namespaces/{}/runs",
            self.base_url, run.namespace
        );
        let response = self.client.post(&url).json(run).send().await?;

        if response.status().as_u16() == 409 {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        self.handle_response(response).await
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        debug!(run = %key, "deleting engine run");
        let response = self.client.delete(self.run_url(key)).send().await?;

        if response.status().as_u16() == 404 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.handle_empty_response(response).await
    }
}

#[async_trait]
impl RecordLister for HttpStore {
    async fn list_keys(&self) -> Result<Vec<RecordKey>> {
        let url = format!("{}/apis/runsync/v1/pipelineruns", self.base_url);
        let response = self.client.get(&url).send().await?;

        let records: Vec<PipelineRun> = self.handle_response(response).await?;
        Ok(records.iter().map(PipelineRun::key).collect())
    }
}
