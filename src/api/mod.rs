//! Registry API server module
//!
//! Serves the export wire contract over the job registry:
//!
//! - `POST /alerts/:alert_id/export/job` - Create an export job
//! - `GET /alerts/:alert_id/export/status/:job_id` - Report job status
//! - `GET /alerts/:alert_id/export/download/:job_id` - Fetch the artifact
//! - `GET /alerts/:alert_id/export/direct` - Single-round-trip retrieval
//! - `DELETE /alerts/:alert_id/export/job/:job_id` - Dispose a job
//! - `GET /health` - Health check
//! - `GET /openapi.json` - OpenAPI specification

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::JobRegistry;
use crate::store::ArtifactStore;
use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub mod routes;
pub mod state;

pub use state::AppState;

/// OpenAPI documentation for the export API
#[derive(OpenApi)]
#[openapi(
    paths(
        routes::create_job,
        routes::job_status,
        routes::download_artifact,
        routes::direct_fetch,
        routes::close_job,
        routes::health_check,
    ),
    components(schemas(
        routes::JobCreatedBody,
        routes::StatusBody,
        crate::error::ErrorBody,
        crate::types::AlertId,
        crate::types::JobId,
    )),
    tags(
        (name = "export", description = "Evidence export lifecycle"),
        (name = "system", description = "Server health")
    )
)]
pub struct ApiDoc;

/// Create the API router with all route definitions
pub fn create_router(registry: JobRegistry, store: Arc<dyn ArtifactStore>) -> Router {
    let state = AppState::new(registry, store);

    Router::new()
        .route("/alerts/:alert_id/export/job", post(routes::create_job))
        .route(
            "/alerts/:alert_id/export/status/:job_id",
            get(routes::job_status),
        )
        .route(
            "/alerts/:alert_id/export/download/:job_id",
            get(routes::download_artifact),
        )
        .route("/alerts/:alert_id/export/direct", get(routes::direct_fetch))
        .route(
            "/alerts/:alert_id/export/job/:job_id",
            delete(routes::close_job),
        )
        .route("/health", get(routes::health_check))
        .route(
            "/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the registry API server on the configured bind address
///
/// Binds the listener, spawns the retention sweep, and serves until shutdown.
/// The sweep task is aborted when serving stops.
pub async fn start_api_server(
    registry: JobRegistry,
    store: Arc<dyn ArtifactStore>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.server.bind_address;

    let sweep = registry.spawn_retention_sweep(config.server.sweep_interval);
    let app = create_router(registry, store);

    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;
    tracing::info!(address = %bind_address, "registry API server listening");

    let served = axum::serve(listener, app)
        .await
        .map_err(|e| Error::ApiServer(e.to_string()));

    sweep.abort();
    tracing::info!("registry API server stopped");
    served
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
