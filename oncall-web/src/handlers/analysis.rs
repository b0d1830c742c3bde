use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use oncall_core::{
    AnalysisRequest, AnalysisResult, AnalysisService, LogFetcher, ReportRenderer, Statistics,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::error_handling::{validation, AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisStatusResponse {
    pub status: String,
    pub analysis_id: String,
    pub message: Option<String>,
    pub progress_percentage: Option<u8>,
    pub document_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct QuickStatsQuery {
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,
}

fn default_hours_back() -> u32 {
    24
}

#[derive(Debug, Serialize)]
pub struct QuickStatsResponse {
    pub success: bool,
    pub data: Statistics,
}

pub async fn analyze_logs(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> AppResult<Json<AnalysisResult>> {
    let Json(request) = payload.map_err(|e| AppError::validation(e.body_text()))?;
    validation::validate_analysis_request(&request)?;

    info!(
        hours_back = request.hours_back,
        focus_on_errors = request.focus_on_errors,
        output_format = %request.output_format,
        "Received log analysis request"
    );

    let service = AnalysisService::from_settings(&state.settings)?;
    let result = service.analyze(&request).await?;

    Ok(Json(result))
}

/// Completed when a report for the id exists on disk.
pub async fn get_analysis_status(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> AppResult<Json<AnalysisStatusResponse>> {
    validation::validate_uuid(&analysis_id, "analysis_id")?;

    let renderer = ReportRenderer::from_settings(&state.settings);
    let document_path = renderer
        .find_report(&analysis_id)
        .ok_or_else(|| AppError::not_found(format!("analysis {}", analysis_id)))?;

    Ok(Json(AnalysisStatusResponse {
        status: "completed".to_string(),
        analysis_id,
        message: Some("Analysis completed".to_string()),
        progress_percentage: Some(100),
        document_path: Some(document_path),
    }))
}

pub async fn get_quick_stats(
    State(state): State<AppState>,
    Query(query): Query<QuickStatsQuery>,
) -> AppResult<Json<QuickStatsResponse>> {
    validation::validate_hours_back(query.hours_back)?;
    info!(hours_back = query.hours_back, "Fetching quick log statistics");

    let fetcher = LogFetcher::from_settings(&state.settings)?;
    let data = fetcher.log_statistics(query.hours_back).await?;

    Ok(Json(QuickStatsResponse {
        success: true,
        data,
    }))
}
