use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Analysis routes
        .route("/analysis", post(handlers::analyze_logs))
        .route("/analysis/", post(handlers::analyze_logs))
        .route(
            "/analysis/status/:analysis_id",
            get(handlers::get_analysis_status),
        )
        .route("/analysis/quick-stats", get(handlers::get_quick_stats))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/health/ready", get(handlers::readiness_check))
}
