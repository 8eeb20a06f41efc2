//! CanonGraph MCP Server Entry Point
//!
//! Opens (or creates) a knowledge graph and serves it over stdio using the
//! Model Context Protocol. Logs go to stderr; stdout carries the protocol.

use canongraph_server::{McpServer, ServerResult};
use canongraph_store::{EmbeddingProvider, HashingEmbedder, KnowledgeConfig, KnowledgeGraph};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// Deterministic feature hashing, no model download
    Hashing,
    /// Local BGE-Small-EN-v1.5 (requires the `fastembed` feature)
    Fastembed,
}

#[derive(Parser)]
#[command(name = "canongraph")]
#[command(about = "CanonGraph knowledge graph server (Model Context Protocol over stdio)")]
#[command(version)]
struct Args {
    /// Directory holding the graph and vector stores
    #[arg(long, short, default_value = ".canongraph")]
    data_dir: PathBuf,

    /// Keep everything in memory; nothing is written to disk
    #[arg(long)]
    in_memory: bool,

    /// JSON configuration file (missing keys take their defaults)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Embedding provider
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hashing)]
    embedder: EmbedderKind,

    /// Vector dimension for the hashing embedder
    #[arg(long, default_value_t = 384)]
    dimension: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canongraph_server=info,canongraph_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("MCP server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> ServerResult<()> {
    let config = match &args.config {
        Some(path) => KnowledgeConfig::from_file(path)?,
        None => KnowledgeConfig::default(),
    };

    let embedder = build_embedder(&args)?;
    tracing::info!(
        "Embedding provider: {} ({}d)",
        embedder.name(),
        embedder.dimension()
    );

    let graph = if args.in_memory {
        tracing::info!("Starting CanonGraph MCP server (in memory)");
        KnowledgeGraph::in_memory(embedder, config)
    } else {
        tracing::info!("Starting CanonGraph MCP server");
        tracing::info!("Data directory: {:?}", args.data_dir);
        std::fs::create_dir_all(&args.data_dir)?;
        KnowledgeGraph::open(&args.data_dir, embedder, config)?
    };

    let mut server = McpServer::new(Arc::new(graph));
    server.run().await
}

fn build_embedder(args: &Args) -> ServerResult<Arc<dyn EmbeddingProvider>> {
    match args.embedder {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(args.dimension)?)),
        EmbedderKind::Fastembed => fastembed_provider(args),
    }
}

#[cfg(feature = "fastembed")]
fn fastembed_provider(args: &Args) -> ServerResult<Arc<dyn EmbeddingProvider>> {
    let data_dir = (!args.in_memory).then_some(args.data_dir.as_path());
    Ok(Arc::new(canongraph_store::FastEmbedProvider::new(data_dir)?))
}

#[cfg(not(feature = "fastembed"))]
fn fastembed_provider(_args: &Args) -> ServerResult<Arc<dyn EmbeddingProvider>> {
    Err(canongraph_server::ServerError::Startup(
        "this build has no fastembed support; rebuild with --features fastembed".to_string(),
    ))
}
