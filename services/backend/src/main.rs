use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod controllers;
mod error;
mod models;
mod routers;
mod secrets;
mod state;
mod tool;

use controllers::Delivery;
use models::format::FormatMap;
use secrets::SecretManager;
use state::AppState;
use tool::YtDlp;

#[tokio::main]
async fn main() -> Result<()> {
    let secrets = SecretManager::new();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(secrets.log_level().into()))
        .with_target(false)
        .init();
    secrets.log_summary();

    let delivery = secrets.delivery()?;
    if let Delivery::Directory(dir) = &delivery {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating downloads directory {}", dir.display()))?;
        info!("📁 Saving downloads to {}", dir.display());
    }

    let tool = YtDlp::new(secrets.tool_program(), secrets.tool_extra_args());
    // Not fatal: the tool may be installed after the server starts.
    match tool.version().await {
        Ok(version) => info!("🎞️ Using yt-dlp {}", version),
        Err(e) => warn!("yt-dlp is not usable yet: {}", e),
    }

    let state = AppState::new(Arc::new(tool), FormatMap::standard(), delivery);
    let app = routers::app(state);

    let addr = SocketAddr::new(secrets.host()?, secrets.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;

    info!("🎬 Converter backend listening on {}", secrets.get("BACKEND_URL"));
    info!("📡 Endpoints: POST /api/getVideoInfo, POST /api/download, GET /api/resolutions");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
    }
    info!("Shutting down");
}
