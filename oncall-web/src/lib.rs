// OnCall Web - HTTP shell over the analysis pipeline

pub mod error_handling;
pub mod handlers;
pub mod routes;

pub use error_handling::{AppError, AppResult};

use axum::Router;
use oncall_core::Settings;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use error_handling::{handle_404, trace_request};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "oncall-agent";

/// Shared, read-only application state. Pipeline components are built per
/// request from these settings.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .nest("/api/v1", routes::api_routes())
        .fallback(handle_404)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(trace_request))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind `settings.host:settings.port` and serve until Ctrl-C.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    tracing::info!(
        environment = %settings.environment,
        port = settings.port,
        "Starting OnCall Agent"
    );

    let app = create_app(AppState::new(settings));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("OnCall Agent listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down OnCall Agent");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
