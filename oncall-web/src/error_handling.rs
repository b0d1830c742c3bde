use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use oncall_core::OnCallError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn, Instrument};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error(transparent)]
    Pipeline(#[from] OnCallError),
}

pub const TRACE_ID_HEADER: &str = "x-trace-id";

tokio::task_local! {
    static TRACE_ID: String;
}

/// Trace id of the request being served, set by [`trace_request`].
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(Clone::clone).ok()
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    pub timestamp: String,
    pub trace_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: String, code: String) -> Self {
        Self {
            error: error_type.to_string(),
            message,
            code,
            timestamp: chrono::Utc::now().to_rfc3339(),
            trace_id: current_trace_id(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: HashMap<String, serde_json::Value>) -> Self {
        self.details = Some(details);
        self
    }
}

fn pipeline_response(err: &OnCallError) -> (StatusCode, ErrorResponse) {
    let (status, label) = match err {
        OnCallError::SourceUnavailable { .. } | OnCallError::FetchFailed { .. } => {
            (StatusCode::BAD_GATEWAY, "GCP integration failed")
        }
        OnCallError::ModelUnavailable { .. } | OnCallError::ModelInvocationFailed { .. } => {
            (StatusCode::BAD_GATEWAY, "LLM analysis failed")
        }
        OnCallError::RenderFailed { .. } | OnCallError::AnalysisFailed { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Analysis failed")
        }
    };

    let mut response = ErrorResponse::new(label, err.to_string(), err.code().to_string());

    if let OnCallError::AnalysisFailed {
        analysis_id, stage, ..
    } = err
    {
        let mut details = HashMap::new();
        details.insert("analysis_id".to_string(), serde_json::json!(analysis_id));
        details.insert("stage".to_string(), serde_json::json!(stage));
        details.insert("cause_code".to_string(), serde_json::json!(err.root().code()));
        response = response.with_details(details);
    }

    (status, response)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Validation { ref message } => {
                warn!("Validation error: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(
                        "validation_error",
                        message.clone(),
                        "VALIDATION_FAILED".to_string(),
                    ),
                )
            }

            AppError::NotFound { ref resource } => {
                warn!("Resource not found: {}", resource);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new(
                        "not_found",
                        format!("Resource not found: {}", resource),
                        "NOT_FOUND".to_string(),
                    ),
                )
            }

            AppError::Pipeline(ref err) => {
                error!(code = err.code(), error = %err, "Request failed");
                pipeline_response(err)
            }
        };

        (status, Json(error_response)).into_response()
    }
}

// Helper functions for creating specific errors
impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

// 404 handler
pub async fn handle_404(uri: Uri) -> impl IntoResponse {
    let error_response = ErrorResponse::new(
        "not_found",
        format!("No route found for {}", uri.path()),
        "ROUTE_NOT_FOUND".to_string(),
    );

    (StatusCode::NOT_FOUND, Json(error_response))
}

// Result type alias
pub type AppResult<T> = Result<T, AppError>;

// Validation helpers
pub mod validation {
    use super::*;
    use oncall_core::AnalysisRequest;
    use uuid::Uuid;

    pub const MAX_HOURS_BACK: u32 = 168;
    pub const MAX_LOGS: u32 = 1000;

    pub fn validate_uuid(id: &str, field_name: &str) -> AppResult<Uuid> {
        Uuid::parse_str(id).map_err(|_| {
            AppError::validation(format!("Invalid {}: must be a valid UUID", field_name))
        })
    }

    pub fn validate_hours_back(hours_back: u32) -> AppResult<()> {
        if !(1..=MAX_HOURS_BACK).contains(&hours_back) {
            return Err(AppError::validation(format!(
                "hours_back must be between 1 and {}",
                MAX_HOURS_BACK
            )));
        }
        Ok(())
    }

    pub fn validate_max_logs(max_logs: Option<u32>) -> AppResult<()> {
        match max_logs {
            Some(n) if !(1..=MAX_LOGS).contains(&n) => Err(AppError::validation(format!(
                "max_logs must be between 1 and {}",
                MAX_LOGS
            ))),
            _ => Ok(()),
        }
    }

    pub fn validate_analysis_request(request: &AnalysisRequest) -> AppResult<()> {
        validate_hours_back(request.hours_back)?;
        validate_max_logs(request.max_logs)
    }
}

// Middleware for request tracing
pub async fn trace_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let trace_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", trace_id = %trace_id);
    span.in_scope(|| tracing::info!(method = %method, uri = %uri, "Request started"));

    let mut response = TRACE_ID
        .scope(trace_id.clone(), next.run(request))
        .instrument(span.clone())
        .await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    span.in_scope(|| {
        tracing::info!(
            method = %method,
            uri = %uri,
            status = %response.status(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        )
    });

    response
}
