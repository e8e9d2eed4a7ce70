use std::{net::SocketAddr, sync::Arc};

use bridge_core::LoopbackSink;
use server::{build_router, config::ServerConfig, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tts_core::RealtimeTts;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting continuity agent...");

    let config = ServerConfig::from_env();
    info!(?config, "Server configuration loaded");

    let speech = Arc::new(RealtimeTts::new(config.tts_config()).map_err(|e| {
        anyhow::anyhow!("{e}. Set OPENAI_API_KEY (and optionally OPENAI_REALTIME_URL).")
    })?);

    // No room transport is linked into this binary; frames are paced into
    // an in-process queue with the same playout semantics.
    warn!("No media transport configured, publishing into a loopback sink");
    let sink = Arc::new(LoopbackSink::new());

    let state = AppState::new(config.clone(), sink, speech)?;
    let app = build_router(state.clone());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Agent listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, unpublishing track");
    if let Err(e) = state.publisher.lock().await.stop().await {
        warn!("Publisher stop failed: {e}");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
