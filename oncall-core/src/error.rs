use thiserror::Error;

use crate::analysis::AnalysisStage;

/// Boxed underlying cause carried by every pipeline error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type OnCallResult<T> = Result<T, OnCallError>;

pub mod codes {
    pub const GCP_PROJECT_ID_MISSING: &str = "GCP_PROJECT_ID_MISSING";
    pub const GCP_CLIENT_INIT_ERROR: &str = "GCP_CLIENT_INIT_ERROR";
    pub const GCP_LOG_FETCH_ERROR: &str = "GCP_LOG_FETCH_ERROR";
    pub const GCP_STATS_ERROR: &str = "GCP_STATS_ERROR";
    pub const OPENAI_API_KEY_MISSING: &str = "OPENAI_API_KEY_MISSING";
    pub const ANTHROPIC_API_KEY_MISSING: &str = "ANTHROPIC_API_KEY_MISSING";
    pub const LLM_PROVIDER_UNSUPPORTED: &str = "LLM_PROVIDER_UNSUPPORTED";
    pub const LLM_INIT_ERROR: &str = "LLM_INIT_ERROR";
    pub const LLM_ANALYSIS_ERROR: &str = "LLM_ANALYSIS_ERROR";
    pub const DOCUMENT_WRITE_ERROR: &str = "DOCUMENT_WRITE_ERROR";
    pub const ANALYSIS_ERROR: &str = "ANALYSIS_ERROR";
}

/// Error taxonomy of the analysis pipeline.
///
/// Component errors (`SourceUnavailable` .. `RenderFailed`) never cross the
/// orchestrator boundary; [`crate::AnalysisService::analyze`] wraps them into
/// `AnalysisFailed`.
#[derive(Error, Debug)]
pub enum OnCallError {
    #[error("Log source unavailable: {message}")]
    SourceUnavailable {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to fetch logs: {message}")]
    FetchFailed {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Model provider unavailable: {message}")]
    ModelUnavailable {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Model invocation failed: {message}")]
    ModelInvocationFailed {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to write analysis document: {message}")]
    RenderFailed {
        code: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Log analysis failed: {source}")]
    AnalysisFailed {
        analysis_id: String,
        stage: AnalysisStage,
        #[source]
        source: Box<OnCallError>,
    },
}

impl OnCallError {
    pub fn source_unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn model_unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { code, .. }
            | Self::FetchFailed { code, .. }
            | Self::ModelUnavailable { code, .. }
            | Self::ModelInvocationFailed { code, .. }
            | Self::RenderFailed { code, .. } => *code,
            Self::AnalysisFailed { .. } => codes::ANALYSIS_ERROR,
        }
    }

    pub fn analysis_id(&self) -> Option<&str> {
        match self {
            Self::AnalysisFailed { analysis_id, .. } => Some(analysis_id),
            _ => None,
        }
    }

    /// Innermost component error for orchestrator failures, `self` otherwise.
    pub fn root(&self) -> &OnCallError {
        match self {
            Self::AnalysisFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_log_source(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. } | Self::FetchFailed { .. })
    }

    pub fn is_model(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::ModelInvocationFailed { .. }
        )
    }
}
