use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppState, SERVICE_NAME, VERSION};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub api: &'static str,
    pub gcp: &'static str,
    pub llm: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: VERSION,
    })
}

/// Readiness probe. Reports whether credentials are configured; nothing is
/// contacted.
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let configured = |ok: bool| if ok { "configured" } else { "not_configured" };

    Json(ReadinessResponse {
        status: "ready",
        checks: ReadinessChecks {
            api: "ready",
            gcp: configured(state.settings.gcp_configured()),
            llm: configured(state.settings.llm_configured()),
        },
    })
}
