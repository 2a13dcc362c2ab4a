use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::callback::HttpNotifier;
use crate::infrastructure::storage::s3::S3Connector;
use crate::state::AppState;
use crate::workers::encoder::FfmpegEncoder;
use crate::workers::queue::JobQueue;
use crate::workers::transcoder::Pipeline;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting HLS converter...");

    let config = AppConfig::from_env();
    if config.storage.bucket.is_none() {
        error!("AWS_BUCKET is not set, conversions will fail until it is configured");
    }

    tokio::fs::create_dir_all(&config.temp_dir).await?;

    let pipeline = Pipeline::new(
        Arc::new(S3Connector::new(config.storage.clone())),
        Arc::new(FfmpegEncoder::new(config.ffmpeg_path.clone())),
        Arc::new(HttpNotifier::new(config.callback_timeout)),
        config.temp_dir.clone(),
        config.callback_url.clone(),
    );
    let queue = Arc::new(JobQueue::start(Arc::new(pipeline), config.queue_capacity));

    let state = AppState::new(config.clone(), queue.clone());
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);
    info!("Swagger UI at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining conversion queue");
    queue.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
