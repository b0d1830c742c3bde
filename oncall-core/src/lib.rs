// OnCall Core - log analysis pipeline
//
// Fetches Cloud Logging entries, asks a language model for findings and
// persists a report. Used by both the web service and the CLI binary.

pub mod ai_provider;
pub mod analysis;
pub mod config;
pub mod error;
pub mod log_source;
pub mod logging;
pub mod models;
pub mod output;
pub mod statistics;

pub use ai_provider::{
    create_backend, parse_model_response, AIError, AIProvider, LlmAnalyzer, ModelAnalysis,
    ModelBackend, Prompt,
};
pub use analysis::{AnalysisRequest, AnalysisService, AnalysisStage};
pub use config::Settings;
pub use error::{OnCallError, OnCallResult};
pub use log_source::{CloudLoggingClient, LogFetcher, LogQuery, LogSource, RawLogEntry};
pub use models::{
    AnalysisResult, Finding, FindingError, FindingSeverity, LogEntry, LogPayload, LogResource,
    SeverityCounts, Statistics,
};
pub use output::{OutputFormat, ReportContent, ReportRenderer};
pub use statistics::compute_statistics;
