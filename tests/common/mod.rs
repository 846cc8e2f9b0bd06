#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use orbitrag::completion::{ChatMessage, Completer};
use orbitrag::config::PipelineSettings;
use orbitrag::embedder::Embedder;
use orbitrag::error::{RagError, Result};
use orbitrag::vector_store::{
    CollectionSpec, CollectionStatus, DocumentChunkPayload, RecordPayload, ScoredRecord,
    VectorRecord, VectorStore,
};
use orbitrag::{AppState, N2yoClient, RagService, TrackArchive};

pub const DIMS: usize = 4;

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });
    format!("http://{addr}")
}

pub struct StubEmbedder {
    pub fail: bool,
    pub calls: Mutex<usize>,
}

impl StubEmbedder {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(RagError::Upstream {
                service: "embeddings",
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(inputs
            .iter()
            .map(|text| vec![text.chars().count() as f32, 0.0, 0.0, 1.0])
            .collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }
}

/// Records upserts and serves canned search hits.
#[derive(Default)]
pub struct RecordingStore {
    pub upserts: Mutex<Vec<(String, Vec<VectorRecord>)>>,
    pub hits: Vec<ScoredRecord>,
    pub searches: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn with_hits(count: usize) -> Self {
        let hits = (0..count)
            .map(|i| ScoredRecord {
                id: format!("id-{i}"),
                score: 1.0 - i as f32 * 0.05,
                payload: RecordPayload::DocumentChunk(DocumentChunkPayload {
                    filename: format!("doc-{i}.txt"),
                    text: format!("chunk {i}"),
                }),
            })
            .collect();
        Self {
            hits,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn ensure_collection(&self, _spec: &CollectionSpec) -> Result<CollectionStatus> {
        Ok(CollectionStatus::Existing)
    }

    async fn upsert(&self, spec: &CollectionSpec, records: Vec<VectorRecord>) -> Result<()> {
        orbitrag::vector_store::validate_batch(spec, &records)?;
        self.upserts
            .lock()
            .unwrap()
            .push((spec.name.clone(), records));
        Ok(())
    }

    async fn search(
        &self,
        spec: &CollectionSpec,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>> {
        spec.check_vector(vector)?;
        self.searches.lock().unwrap().push(limit);
        // ignores `limit`; callers cap the results
        Ok(self.hits.clone())
    }
}

/// Replies with a fixed string, or fails with a config error.
pub struct ScriptedCompleter {
    pub reply: Option<String>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedCompleter {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            reply: None,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Completer for ScriptedCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY is not set".into()))
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings::new(
        1500,
        8,
        CollectionSpec::documents("documents", DIMS),
        CollectionSpec::satellite_tracks("satellite_tracks"),
    )
}

pub struct Harness {
    pub embedder: Arc<StubEmbedder>,
    pub store: Arc<RecordingStore>,
    pub completer: Arc<ScriptedCompleter>,
    pub state: AppState,
}

pub fn harness(
    embedder: StubEmbedder,
    store: RecordingStore,
    completer: ScriptedCompleter,
    n2yo_base: &str,
) -> Harness {
    let embedder = Arc::new(embedder);
    let store = Arc::new(store);
    let completer = Arc::new(completer);
    let settings = settings();
    let tracks = TrackArchive::new(store.clone(), settings.tracks().clone());
    let n2yo = N2yoClient::new(Some("KEY".into()), n2yo_base, Duration::from_secs(5))
        .expect("n2yo client");
    let state = AppState {
        rag: RagService::new(embedder.clone(), store.clone(), completer.clone(), settings),
        n2yo,
        completer: completer.clone(),
        tracks,
    };
    Harness {
        embedder,
        store,
        completer,
        state,
    }
}
