//! HTTP server wiring for the learning core
//!
//! The server exposes the inference API plus the learning endpoints the
//! mobile app calls. All persistent state lives on disk under the configured
//! data directory; the state struct only carries service handles.

pub mod http;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::evaluation::EvaluationService;
use crate::inference::InferenceService;
use crate::learning::ContinuousLearningCoordinator;
use crate::pipeline::MlOpsPipeline;
use crate::samples::store::SampleStore;
use crate::training::TrainingPipeline;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub inference: Arc<InferenceService>,
    pub pipeline: Arc<MlOpsPipeline>,
    pub coordinator: Arc<ContinuousLearningCoordinator>,
}

/// Wire the full service stack from configuration. Shared by the server
/// and the one-shot CLI commands.
pub fn build_state(config: Config) -> Result<ServerState> {
    let root = config.data_dir()?;
    let models_dir = root.join("models");
    let results_dir = root.join("results");

    let store = SampleStore::open(&root).context("Failed to open sample store")?;
    let inference = Arc::new(InferenceService::new(
        config.inference.clone(),
        models_dir.clone(),
    ));
    let training = TrainingPipeline::new(store.clone(), models_dir.clone(), config.training.clone());
    let evaluation = EvaluationService::new(
        store.clone(),
        models_dir,
        results_dir,
        config.evaluation.clone(),
    );
    let pipeline = Arc::new(MlOpsPipeline::new(
        store.clone(),
        training,
        evaluation,
        Arc::clone(&inference),
        config.monitoring.clone(),
    ));
    let coordinator = Arc::new(ContinuousLearningCoordinator::new(
        store,
        Arc::clone(&inference),
        Arc::clone(&pipeline),
        config.retraining.clone(),
    ));

    Ok(ServerState {
        config: Arc::new(config),
        inference,
        pipeline,
        coordinator,
    })
}

/// Build the application router over a prepared state
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Batch requests carry several images, so the body limit scales with
    // the batch cap rather than the single-image limit.
    let body_limit = state
        .config
        .inference
        .max_image_bytes
        .saturating_mul(http::MAX_BATCH_IMAGES + 1);

    Router::new()
        .route("/health", get(http::health_handler))
        .route("/analyze", post(http::analyze_handler))
        .route("/analyze/batch", post(http::batch_analyze_handler))
        .route("/models", get(http::models_handler))
        .route("/api/learning/stats", get(http::stats_handler))
        .route("/api/learning/capture", post(http::capture_handler))
        .route("/api/learning/feedback", post(http::feedback_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let state = build_state(config)?;
    let loaded = state.inference.reload_models().await?;
    state.pipeline.start_monitoring();

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid server address")?;
    let app = router(state);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     TireLearn Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Server binding to: {}", addr);
    println!("✓ Models loaded: {}", loaded);
    println!("✓ Drift monitoring started");
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!();

    info!(%addr, loaded, "server started");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
