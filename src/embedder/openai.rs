//! OpenAI-based embedding client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Embedder;
use crate::error::{RagError, Result};

/// Async embeddings client that talks to OpenAI-compatible endpoints.
///
/// A missing API key does not prevent construction; every call then fails
/// with [`RagError::Config`] without touching the network.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: String,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(RagError::Config("missing OpenAI embedding model name".into()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
            dimensions,
        })
    }

    fn auth_header(&self) -> Result<HeaderValue> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".into()))?;
        HeaderValue::from_str(&format!("Bearer {}", key.trim()))
            .map_err(|_| RagError::Config("invalid OpenAI API key".into()))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let auth = self.auth_header()?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, inputs = inputs.len(), "requesting embeddings");

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: Some(self.dimensions),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("embeddings", resp).await);
        }

        let mut parsed: EmbeddingResponse = resp.json().await?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(RagError::Upstream {
                service: "embeddings",
                status: 0,
                body: format!(
                    "returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    inputs.len()
                ),
            });
        }
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        // Port 9 (discard) would fail to connect; a Config error proves no call was made.
        let embedder = OpenAiEmbedder::new(
            None,
            "http://127.0.0.1:9",
            "text-embedding-3-small".into(),
            1536,
            Duration::from_secs(1),
        )
        .expect("build");
        let err = embedder.embed(&["hi".to_string()]).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)), "got {err:?}");
    }

    #[test]
    fn responses_are_reordered_by_index() {
        let body = r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }
}
