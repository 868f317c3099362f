//! HTTP client for the users/update endpoint.
//!
//! Sends one POST per record and classifies the response by status code.
//! Response bodies are never read.

use crate::error::SyncError;
use crate::types::{
    DispatchResult, RequestOutcome, RowRecord, SyncConfig, UpdatePayload, EMAIL_FIELD,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use secrecy::{ExposeSecret, Secret};
use std::time::Instant;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "Api-Key";

/// Client for the update endpoint.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct UpdateClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl UpdateClient {
    /// Build a client from the run configuration.
    ///
    /// No request timeout is set unless `config.timeout` is.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ConfigError` if the API key cannot be sent as a
    /// header value.
    pub fn with_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("user-sync/", env!("CARGO_PKG_VERSION")))
            .default_headers(default_headers(&config.api_key)?)
            .pool_max_idle_per_host(config.concurrency);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder.build().map_err(|e| {
            SyncError::transport_with_source("Failed to create HTTP client", e.to_string())
        })?;

        Ok(Self {
            http_client,
            endpoint: config.api_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the update request for one record and return the raw status code.
    ///
    /// # Errors
    ///
    /// - `SyncError::MissingField` if the record has no `email` column
    /// - `SyncError::TransportError` / `SyncError::Timeout` if no response
    ///   status was obtained
    pub async fn send(&self, record: &RowRecord) -> Result<u16, SyncError> {
        let email = record
            .email()
            .ok_or_else(|| SyncError::missing_field(EMAIL_FIELD, record.row))?;
        let body = serde_json::to_vec(&UpdatePayload::from_value(email))?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .body(body)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    /// Send one record and wrap the result as an outcome.
    ///
    /// Errors never escape; they become `RequestOutcome::TransportFailure`
    /// so the caller decides whether to abort.
    pub async fn dispatch(&self, record: RowRecord) -> DispatchResult {
        let start = Instant::now();
        let outcome = match self.send(&record).await {
            Ok(status) => {
                tracing::debug!(row = record.row, status, "update request completed");
                RequestOutcome::from_status(status)
            }
            Err(e) => {
                tracing::warn!(row = record.row, error = %e, "update request failed");
                RequestOutcome::TransportFailure { error: e }
            }
        };

        DispatchResult {
            record,
            outcome,
            elapsed: start.elapsed(),
        }
    }
}

/// Headers sent with every update request.
fn default_headers(api_key: &Secret<String>) -> Result<HeaderMap, SyncError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let mut key = HeaderValue::from_str(api_key.expose_secret())
        .map_err(|_| SyncError::config("API key contains characters not allowed in a header"))?;
    key.set_sensitive(true);
    headers.insert(HeaderName::from_static("api-key"), key);

    Ok(headers)
}
