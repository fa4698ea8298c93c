//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop for the popcorn service.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::ingest::IngestService;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub ingest: Arc<IngestService>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let db = Arc::new(db);
        let ingest = Arc::new(IngestService::from_config(db.clone(), &config));
        Self {
            config: Arc::new(config),
            db,
            ingest,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(handlers::stats::index).post(handlers::submissions::submit))
        .route("/distro", get(handlers::stats::distros))
        .route("/distro/{name}/{version}", get(handlers::stats::distro_release))
        .route("/vendor/{name}", get(handlers::stats::vendor))
        .route("/system/{hw_uuid}", get(handlers::stats::system))
        .route("/submission/{id}", get(handlers::stats::submission))
        .route(
            "/package/{name}/{version}/{release}/{arch}",
            get(handlers::stats::package),
        )
        .route(
            "/package/{name}/{version}/{release}/{epoch}/{arch}",
            get(handlers::stats::package_with_epoch),
        )
        .route("/healthz", get(handlers::health))
        .route("/readyz", get(handlers::ready))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let app = create_app(AppState::new(config, db));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::submissions::submit,
        crate::handlers::stats::index,
        crate::handlers::stats::distros,
        crate::handlers::stats::distro_release,
        crate::handlers::stats::vendor,
        crate::handlers::stats::system,
        crate::handlers::stats::submission,
        crate::handlers::stats::package,
        crate::handlers::stats::package_with_epoch,
        crate::handlers::health,
        crate::handlers::ready,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::submissions::SubmissionForm,
            crate::handlers::stats::IndexResponse,
            crate::handlers::stats::DistroListResponse,
            crate::handlers::stats::DistroReleaseResponse,
            crate::handlers::stats::VendorResponse,
            crate::handlers::stats::SystemResponse,
            crate::handlers::stats::SubmissionResponse,
            crate::handlers::stats::PackageResponse,
            crate::repositories::StatusCounts,
            crate::repositories::submission::PackageFactRow,
        )
    ),
    tags(
        (name = "submissions", description = "Report upload"),
        (name = "stats", description = "Aggregate statistics"),
        (name = "health", description = "Liveness and readiness probes")
    ),
    info(
        title = "Popcorn Submission Service",
        description = "Collects package usage reports and serves aggregate statistics",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
