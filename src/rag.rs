//! Ingest and question-answering flows over the document collection.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::chunker::{chunk_text, DocumentChunk};
use crate::completion::{ChatMessage, Completer};
use crate::config::PipelineSettings;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::extract::extract_text;
use crate::vector_store::{ScoredRecord, VectorRecord, VectorStore};

/// Records retrieved as context for one question.
pub const MAX_CONTEXT_RESULTS: usize = 8;

const SYSTEM_PROMPT: &str = "You are a careful assistant. Answer only from the provided context. \
Cite the source filename for every claim as [filename]. If the context does not contain the \
answer, say that you do not know.";

/// Result of ingesting one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Nothing usable was extracted.
    NoContent,
    /// The chunks were embedded and stored.
    Stored {
        /// Number of chunks written.
        chunks: usize,
    },
}

/// Retrieved record reported back with an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// Record id in the documents collection.
    pub id: String,
    /// Source filename.
    pub file: String,
}

/// Generated answer plus every record that was retrieved as context.
///
/// `used` lists all retrieved records, not just those the model cited; the
/// model's citations are not checked against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatAnswer {
    /// Model answer text.
    pub answer: String,
    /// Retrieved records, best match first.
    pub used: Vec<Citation>,
}

/// Coordinates extraction, chunking, embedding, storage and completion.
#[derive(Clone)]
pub struct RagService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    completer: Arc<dyn Completer>,
    settings: PipelineSettings,
}

impl RagService {
    /// Wires the pipeline together.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        completer: Arc<dyn Completer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            completer,
            settings,
        }
    }

    /// Pipeline settings in use.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Extract → chunk → embed → upsert, as a single batch.
    ///
    /// When embedding fails nothing is written.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestOutcome> {
        let owned_name = filename.to_string();
        let owned_bytes = bytes.to_vec();
        let extracted = tokio::task::spawn_blocking(move || extract_text(&owned_name, &owned_bytes))
            .await
            .map_err(|err| RagError::Extraction(format!("extraction task failed: {err}")))??;
        let Some(text) = extracted else {
            info!(filename, "no content extracted");
            return Ok(IngestOutcome::NoContent);
        };
        let windows = chunk_text(&text, self.settings.chunk_chars());
        if windows.is_empty() {
            info!(filename, "extracted text produced no chunks");
            return Ok(IngestOutcome::NoContent);
        }
        let chunks = DocumentChunk::from_windows(filename, windows);
        let inputs: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();

        let embeddings = self.embedder.embed(&inputs).await.map_err(|err| {
            error!(filename, error = %err, "embedding failed during ingestion");
            err
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Upstream {
                service: "embeddings",
                status: 0,
                body: format!(
                    "returned {} embeddings for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| VectorRecord::from_chunk(chunk, vector))
            .collect();
        let count = records.len();
        self.store
            .upsert(self.settings.documents(), records)
            .await?;
        info!(filename, chunks = count, "ingested document");
        Ok(IngestOutcome::Stored { chunks: count })
    }

    /// Embed query → search → assemble context → complete.
    pub async fn answer(&self, query: &str) -> Result<ChatAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidRequest(
                "query text must not be empty".into(),
            ));
        }
        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Upstream {
                service: "embeddings",
                status: 0,
                body: "no embedding returned for query".into(),
            })?;

        let limit = self.settings.top_k().min(MAX_CONTEXT_RESULTS);
        let mut hits = self
            .store
            .search(self.settings.documents(), &vector, limit)
            .await?;
        hits.truncate(limit);

        let context = render_context(&hits);
        let messages = build_messages(&context, query);
        let answer = self.completer.complete(&messages).await?;
        let used = hits
            .into_iter()
            .filter_map(|hit| {
                hit.payload.as_document().map(|doc| Citation {
                    id: hit.id.clone(),
                    file: doc.filename.clone(),
                })
            })
            .collect::<Vec<_>>();
        info!(retrieved = used.len(), "answered question");
        Ok(ChatAnswer { answer, used })
    }
}

/// Joins retrieved chunk texts with blank lines.
pub fn render_context(hits: &[ScoredRecord]) -> String {
    hits.iter()
        .filter_map(|hit| hit.payload.as_document())
        .map(|doc| doc.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System instruction plus a user turn carrying the context and question.
pub fn build_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Context:\n{context}\n\nQuestion: {question}\nAnswer with citations."
        )),
    ]
}
