//! cgMLST calculation API server.

use bio_api::server::{self, AppState};
use bio_calc::EngineConfig;
use bio_dists::{CgmlstDists, NativeDistances};
use bio_scheduler::TaskScheduler;
use bio_types::{DistanceTool, DocumentStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn document_store() -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error + Send + Sync>> {
    #[cfg(feature = "sqlite")]
    if let Ok(path) = std::env::var("BIO_API_SQLITE") {
        tracing::info!(path = %path, "using SQLite document store");
        return Ok(Arc::new(bio_store::SqliteDocumentStore::new(path)?));
    }
    Ok(Arc::new(bio_store::InMemoryDocumentStore::new()))
}

fn distance_tool(config: &EngineConfig) -> Arc<dyn DistanceTool> {
    if config.distance_tool == "native" {
        Arc::new(NativeDistances::new())
    } else {
        Arc::new(CgmlstDists::new(&config.distance_tool))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    let tool = distance_tool(&config);
    tracing::info!(
        dmx_dir = %config.dmx_dir.display(),
        tool = tool.name(),
        collection = %config.seq_collection,
        "engine configured"
    );
    let scheduler = Arc::new(TaskScheduler::new(document_store()?, tool, config));
    let app = server::router(Arc::new(AppState { scheduler }));

    let addr: SocketAddr = std::env::var("BIO_API_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    tracing::info!("cgMLST API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
