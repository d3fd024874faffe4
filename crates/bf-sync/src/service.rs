//! Remote document service seam.
//!
//! [`DocumentService`] is the trait the sync engine drives; the HTTP
//! implementation talks JSON to the real service. Tests substitute an
//! in-memory implementation.

use std::time::Duration;

use serde::Deserialize;
use ureq::Agent;

use bf_model::{Document, DocumentId};

/// Default HTTP timeout for document service calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error from a document service call. All variants are per-call; the
/// sync engine decides what is retryable.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Request failed (network error, timeout, TLS, ...).
    #[error("document service request failed")]
    Http(#[from] ureq::Error),

    /// Service returned an error status.
    #[error("document service HTTP error: {status} - {body}")]
    Status {
        status: u16,
        body: String,
    },

    /// Response body did not decode as the expected shape.
    #[error("document service returned an undecodable response: {0}")]
    Decode(String),
}

/// Remote document service.
///
/// `query_versions` is the cheap call and `fetch_document` the expensive
/// one; the engine batches the former to avoid the latter.
pub trait DocumentService: Send + Sync {
    /// Fetch a document's full content.
    fn fetch_document(&self, id: &DocumentId) -> Result<Document, ServiceError>;

    /// Current versions for `ids`, order-preserving and one entry per
    /// input id. A document that is gone or not visible reports version
    /// `0`, so any stored copy counts as current.
    ///
    /// Callers must verify the result length equals the input length and
    /// treat a mismatch as a hard error.
    fn query_versions(&self, ids: &[DocumentId]) -> Result<Vec<i64>, ServiceError>;
}

#[derive(Deserialize)]
struct VersionsResponse {
    /// Parallel to the requested ids; `null` for unavailable documents.
    versions: Vec<Option<i64>>,
}

/// HTTP implementation of [`DocumentService`].
pub struct HttpDocumentService {
    agent: Agent,
    base_url: String,
    token: String,
}

impl HttpDocumentService {
    /// Create a client for the service at `base_url`, authenticating with
    /// the given bearer token.
    #[must_use]
    pub fn new(base_url: &str, token: &str) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(DEFAULT_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        }
    }

    fn check_status(status: u16, body: String) -> Result<String, ServiceError> {
        if status >= 400 {
            return Err(ServiceError::Status { status, body });
        }
        Ok(body)
    }
}

impl DocumentService for HttpDocumentService {
    fn fetch_document(&self, id: &DocumentId) -> Result<Document, ServiceError> {
        let url = format!("{}/documents/{id}", self.base_url);
        tracing::debug!(%id, "fetching document");
        let response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .call()?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        let body = Self::check_status(status, body)?;
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    fn query_versions(&self, ids: &[DocumentId]) -> Result<Vec<i64>, ServiceError> {
        let url = format!("{}/documents/versions", self.base_url);
        let req = serde_json::json!({
            "ids": ids.iter().map(DocumentId::as_str).collect::<Vec<_>>(),
        });
        tracing::debug!(count = ids.len(), "querying document versions");
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .send_json(&req)?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        let body = Self::check_status(status, body)?;
        let rsp: VersionsResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(rsp.versions.into_iter().map(|v| v.unwrap_or(0)).collect())
    }
}
