use std::sync::Arc;

use anyhow::Context;
use atlas_slicer::{
    AtlasProvider, BrainGlobeCache, Session,
    config::Config,
    server::{AppState, router},
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let atlas_dir = config.atlas_dir();
    info!(source = %config.use_source, dir = %atlas_dir.display(), check_latest = config.check_latest, "loading atlas");

    let volume = BrainGlobeCache::new(&atlas_dir, config.check_latest)
        .reference(&config.use_source)
        .with_context(|| format!("could not load atlas {}", config.use_source))?;
    let session = Session::new(Arc::new(volume));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("could not bind {}", config.bind))?;
    info!(addr = %listener.local_addr()?, "viewer ready");
    axum::serve(listener, router(AppState::new(session))).await?;
    Ok(())
}
