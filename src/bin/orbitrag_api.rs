use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use orbitrag::config::non_blank;
use orbitrag::{
    bootstrap_collections, router, AppState, Completer, Embedder, N2yoClient, OpenAiCompleter,
    OpenAiEmbedder, QdrantStore, RagService, ServiceCli, TrackArchive, VectorStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = ServiceCli::parse();
    let settings = cli.build_settings();

    let openai_key = non_blank(cli.openai_api_key.clone());
    if openai_key.is_none() {
        warn!("OPENAI_API_KEY is not set; upload and chat requests will fail");
    }
    let n2yo_key = non_blank(cli.n2yo_api_key.clone());
    if n2yo_key.is_none() {
        warn!("N2YO_API_KEY is not set; tracking requests will fail");
    }

    let embedder = OpenAiEmbedder::new(
        openai_key.clone(),
        &cli.openai_base_url,
        cli.embed_model.clone(),
        cli.embed_dimensions,
        cli.embed_timeout(),
    )
    .context("failed to build embedding client")?;
    let completer = OpenAiCompleter::new(
        openai_key,
        &cli.openai_base_url,
        cli.chat_model.clone(),
        cli.completion_strategy,
        cli.completion_timeout(),
    )
    .context("failed to build completion client")?
    .with_sampling(cli.temperature, cli.max_completion_tokens);
    let store = QdrantStore::new(
        &cli.qdrant_url,
        non_blank(cli.qdrant_api_key.clone()),
        cli.qdrant_timeout(),
    )
    .context("failed to build Qdrant client")?;
    let n2yo = N2yoClient::new(n2yo_key, &cli.n2yo_base_url, cli.n2yo_timeout())
        .context("failed to build N2YO client")?;

    bootstrap_collections(&store, &[settings.documents(), settings.tracks()])
        .await
        .with_context(|| format!("failed to prepare Qdrant collections at {}", cli.qdrant_url))?;

    let embedder: Arc<dyn Embedder> = Arc::new(embedder);
    let store: Arc<dyn VectorStore> = Arc::new(store);
    let completer: Arc<dyn Completer> = Arc::new(completer);
    let tracks = TrackArchive::new(store.clone(), settings.tracks().clone());
    let state = AppState {
        rag: RagService::new(embedder, store, completer.clone(), settings),
        n2yo,
        completer,
        tracks,
    };
    let app = router(state, cli.max_upload_bytes());

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, strategy = ?cli.completion_strategy, "orbitrag-api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
