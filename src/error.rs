//! Error taxonomy shared by every pipeline stage.

use thiserror::Error;

/// Errors surfaced by extraction, the upstream clients and the orchestrator.
#[derive(Debug, Error)]
pub enum RagError {
    /// A credential or setting required by the operation is missing.
    ///
    /// Raised before any network call is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// An external service answered with a non-success response.
    #[error("{service} request failed ({status}): {body}")]
    Upstream {
        /// Short name of the failing service (`embeddings`, `qdrant`, ...).
        service: &'static str,
        /// HTTP status code, or 0 when the failure was detected in a 2xx body.
        status: u16,
        /// Raw response body kept for diagnosis.
        body: String,
    },

    /// The uploaded document could not be parsed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Model output could not be turned into structured parameters.
    #[error("{message}")]
    Parse {
        /// What was wrong with the output.
        message: String,
        /// Raw model output attached for debugging.
        raw: String,
    },

    /// A vector store invariant was violated or its response was malformed.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// The caller sent an unusable request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Transport-level HTTP failure (connect, timeout, body decode).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// Builds an [`RagError::Upstream`] from a failed response, consuming its body.
    pub(crate) async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Self::Upstream {
            service,
            status,
            body,
        }
    }
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, RagError>;
