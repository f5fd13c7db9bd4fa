use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use reel_render::{create_router, AppState, Config, RenderPipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reel-render", version, about = "Image + audio to captioned vertical video")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/reel-render")]
    config: String,

    /// Listen port (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Listen address (overrides config)
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Encoder: {} (timeout {}s, {} concurrent)",
        cfg.render.ffmpeg_path, cfg.render.timeout_secs, cfg.render.max_concurrent_encodes
    );
    info!("Work directory: {}", cfg.render.work_dir.display());
    info!("Upload endpoint: {}", cfg.upload.endpoint);

    let pipeline = RenderPipeline::from_config(&cfg)?;
    let state = AppState::new(pipeline, cfg.service.limits.clone());
    let pipeline = Arc::clone(&state.pipeline);
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Renders detached from dropped connections may still be queued
    pipeline.compositor().close();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
