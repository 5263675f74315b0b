//! HTTP transport and response handling for GraphQL operations.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;

use beacon_core::ApiSettings;
use beacon_loading::LoadingManager;

use crate::types::{GqlErrorEntry, GqlRequest, GqlResponse};

const MAX_ERROR_BODY: usize = 512;

/// Errors from GraphQL operations.
#[derive(Debug, thiserror::Error)]
pub enum GqlError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL errors: {}", join_messages(.0))]
    GraphQl(Vec<GqlErrorEntry>),

    #[error("Response contained no data")]
    MissingData,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

fn join_messages(errors: &[GqlErrorEntry]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// GraphQL client whose every request is counted by a [`LoadingManager`].
///
/// Clone is cheap (reqwest client and manager are both Arc-backed).
#[derive(Clone)]
pub struct GqlClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    loading: LoadingManager,
}

impl GqlClient {
    pub fn new(settings: &ApiSettings, loading: LoadingManager) -> Result<Self, GqlError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()
            .map_err(|e| GqlError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            token: settings.token.clone(),
            loading,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn loading(&self) -> &LoadingManager {
        &self.loading
    }

    /// Execute an operation and decode `data` into `T`.
    pub async fn execute<T: DeserializeOwned>(&self, request: &GqlRequest) -> Result<T, GqlError> {
        let data = self.execute_raw(request).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Execute an operation and return `data` untyped.
    ///
    /// The operation counts as loading from the moment this future is first
    /// polled until it resolves or is dropped.
    pub async fn execute_raw(&self, request: &GqlRequest) -> Result<Value, GqlError> {
        let _guard = self.loading.track();
        let start = Instant::now();

        tracing::debug!(operation = %request.label(), endpoint = %self.endpoint, "Sending GraphQL request");

        let result = self.send(request).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(_) => tracing::debug!(
                operation = %request.label(),
                duration_ms = elapsed_ms,
                "GraphQL request complete"
            ),
            Err(e) => tracing::warn!(
                operation = %request.label(),
                duration_ms = elapsed_ms,
                error = %e,
                "GraphQL request failed"
            ),
        }

        result
    }

    async fn send(&self, request: &GqlRequest) -> Result<Value, GqlError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GqlError::Status {
                status: status.as_u16(),
                body: truncate(text),
            });
        }

        parse_response(&text)
    }
}

impl std::fmt::Debug for GqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GqlClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

/// Map a response body to its `data`, turning a non-empty `errors` array or
/// a missing/null `data` into an error.
pub fn parse_response(body: &str) -> Result<Value, GqlError> {
    let envelope: GqlResponse = serde_json::from_str(body)?;

    if let Some(errors) = envelope.errors {
        if !errors.is_empty() {
            return Err(GqlError::GraphQl(errors));
        }
    }

    match envelope.data {
        Some(Value::Null) | None => Err(GqlError::MissingData),
        Some(data) => Ok(data),
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
