//! Service configuration: command-line flags with environment fallbacks.

use std::time::Duration;

use clap::Parser;

use crate::chunker::DEFAULT_CHUNK_CHARS;
use crate::completion::CompletionStrategy;
use crate::rag::MAX_CONTEXT_RESULTS;
use crate::vector_store::{CollectionSpec, DOCUMENTS_DIMENSIONS};

/// Tunable knobs for the RAG flows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    chunk_chars: usize,
    top_k: usize,
    documents: CollectionSpec,
    tracks: CollectionSpec,
}

impl PipelineSettings {
    /// Constructs a new set of pipeline settings.
    pub fn new(
        chunk_chars: usize,
        top_k: usize,
        documents: CollectionSpec,
        tracks: CollectionSpec,
    ) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
            top_k: top_k.max(1),
            documents,
            tracks,
        }
    }

    /// Characters per chunk window.
    pub fn chunk_chars(&self) -> usize {
        self.chunk_chars
    }

    /// Records retrieved per question.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Collection holding document chunks.
    pub fn documents(&self) -> &CollectionSpec {
        &self.documents
    }

    /// Collection holding satellite tracks.
    pub fn tracks(&self) -> &CollectionSpec {
        &self.tracks
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_chars: DEFAULT_CHUNK_CHARS,
            top_k: MAX_CONTEXT_RESULTS,
            documents: CollectionSpec::documents("documents", DOCUMENTS_DIMENSIONS),
            tracks: CollectionSpec::satellite_tracks("satellite_tracks"),
        }
    }
}

/// Command-line interface for the HTTP service.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "orbitrag-api",
    about = "Document question answering and satellite tracking over Qdrant and OpenAI"
)]
pub struct ServiceCli {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "ORBITRAG_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Qdrant REST endpoint
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    /// Optional Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// Seconds before Qdrant requests time out
    #[arg(long, env = "ORBITRAG_QDRANT_TIMEOUT_SECS", default_value_t = 30)]
    pub qdrant_timeout_secs: u64,

    /// OpenAI API key used for embeddings and completions
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(
        long,
        env = "ORBITRAG_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "ORBITRAG_EMBED_MODEL",
        default_value = "text-embedding-3-small"
    )]
    pub embed_model: String,

    /// Embedding dimension; also the dimension of the documents collection
    #[arg(long, env = "ORBITRAG_EMBED_DIMENSIONS", default_value_t = DOCUMENTS_DIMENSIONS)]
    pub embed_dimensions: usize,

    /// Seconds before embedding requests time out
    #[arg(long, env = "ORBITRAG_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    pub embed_timeout_secs: u64,

    /// Chat model used for answers and NLQ translation
    #[arg(long, env = "ORBITRAG_CHAT_MODEL", default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Which completion endpoint shape(s) to use
    #[arg(
        long,
        env = "ORBITRAG_COMPLETION_STRATEGY",
        value_enum,
        default_value_t = CompletionStrategy::ChatThenPrompt
    )]
    pub completion_strategy: CompletionStrategy,

    /// Sampling temperature for the chat model
    #[arg(long, env = "ORBITRAG_TEMPERATURE", default_value_t = 0.2)]
    pub temperature: f32,

    /// Maximum tokens requested from the chat model
    #[arg(long, env = "ORBITRAG_MAX_COMPLETION_TOKENS", default_value_t = 600)]
    pub max_completion_tokens: usize,

    /// Seconds before completion requests time out
    #[arg(long, env = "ORBITRAG_COMPLETION_TIMEOUT_SECS", default_value_t = 60)]
    pub completion_timeout_secs: u64,

    /// N2YO API key for satellite positions
    #[arg(long, env = "N2YO_API_KEY")]
    pub n2yo_api_key: Option<String>,

    /// Base URL of the N2YO satellite REST API
    #[arg(
        long,
        env = "ORBITRAG_N2YO_BASE",
        default_value = "https://api.n2yo.com/rest/v1/satellite"
    )]
    pub n2yo_base_url: String,

    /// Seconds before N2YO requests time out
    #[arg(long, env = "ORBITRAG_N2YO_TIMEOUT_SECS", default_value_t = 30)]
    pub n2yo_timeout_secs: u64,

    /// Maximum accepted upload size in megabytes
    #[arg(long, env = "ORBITRAG_MAX_UPLOAD_MB", default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Characters per document chunk
    #[arg(long, env = "ORBITRAG_CHUNK_CHARS", default_value_t = DEFAULT_CHUNK_CHARS)]
    pub chunk_chars: usize,

    /// Records retrieved as context per question
    #[arg(long, env = "ORBITRAG_TOP_K", default_value_t = MAX_CONTEXT_RESULTS)]
    pub top_k: usize,

    /// Collection storing document chunks
    #[arg(long, env = "ORBITRAG_DOCS_COLLECTION", default_value = "documents")]
    pub docs_collection: String,

    /// Collection storing satellite tracks
    #[arg(
        long,
        env = "ORBITRAG_TRACKS_COLLECTION",
        default_value = "satellite_tracks"
    )]
    pub tracks_collection: String,
}

impl ServiceCli {
    /// Converts the parsed CLI into `PipelineSettings`.
    pub fn build_settings(&self) -> PipelineSettings {
        PipelineSettings::new(
            self.chunk_chars,
            self.top_k,
            CollectionSpec::documents(self.docs_collection.clone(), self.embed_dimensions),
            CollectionSpec::satellite_tracks(self.tracks_collection.clone()),
        )
    }

    /// Upload body limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.max(1).saturating_mul(1024 * 1024)
    }

    /// Timeout applied to each Qdrant call.
    pub fn qdrant_timeout(&self) -> Duration {
        secs(self.qdrant_timeout_secs)
    }

    /// Timeout applied to each embedding call.
    pub fn embed_timeout(&self) -> Duration {
        secs(self.embed_timeout_secs)
    }

    /// Timeout applied to each completion call.
    pub fn completion_timeout(&self) -> Duration {
        secs(self.completion_timeout_secs)
    }

    /// Timeout applied to each N2YO call.
    pub fn n2yo_timeout(&self) -> Duration {
        secs(self.n2yo_timeout_secs)
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

/// Treats blank strings as absent so an exported-but-empty variable still
/// counts as a missing credential.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
