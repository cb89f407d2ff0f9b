pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod gemini;
pub mod moderation;
pub mod policy;
pub mod staging;

use anyhow::Context;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

//
// Re-export
//
pub use api::{AnalyzeResponse, analyze, healthz, index, log_requests};
pub use app_state::AppState;
pub use config::Config;
pub use error::{AnalyzeError, ErrorResponse};
pub use gemini::{AssetState, GeminiClient, UploadedAsset};
pub use moderation::{ModerationRequest, PollPolicy, moderate, wait_until_ready};
pub use policy::PromptPolicy;
pub use staging::StagedVideo;

/// Build the HTTP surface around an already initialised state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(axum::middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config)
        .await
        .context("Failed to create app state")?;
    let shutdown = state.shutdown.clone();
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.listen_on_port);
    info!("Listening on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, cancelling in-flight requests");
}
