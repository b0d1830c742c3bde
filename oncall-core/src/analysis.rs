//! Orchestration of one analysis run: fetch, statistics, model analysis,
//! report rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai_provider::LlmAnalyzer;
use crate::config::Settings;
use crate::error::{OnCallError, OnCallResult};
use crate::log_source::LogFetcher;
use crate::models::{AnalysisResult, LogEntry, Statistics};
use crate::output::{OutputFormat, ReportContent, ReportRenderer};
use crate::statistics::compute_statistics;

pub const EMPTY_SUMMARY: &str = "No logs found in the specified time range.";
pub const EMPTY_RECOMMENDATION: &str = "Check your GCP logging configuration and filters.";

/// Progress of a run. `AnalysisFailed` records the last stage reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Started,
    Fetched,
    Analyzed,
    Rendered,
    Done,
    Failed,
}

fn default_hours_back() -> u32 {
    24
}

fn default_focus_on_errors() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,
    #[serde(default)]
    pub filter_query: Option<String>,
    #[serde(default)]
    pub max_logs: Option<u32>,
    /// Only `WARNING` and above; `filter_query` is ignored when set.
    #[serde(default = "default_focus_on_errors")]
    pub focus_on_errors: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            hours_back: default_hours_back(),
            filter_query: None,
            max_logs: None,
            focus_on_errors: default_focus_on_errors(),
            output_format: OutputFormat::default(),
        }
    }
}

pub struct AnalysisService {
    fetcher: LogFetcher,
    analyzer: LlmAnalyzer,
    renderer: ReportRenderer,
}

impl AnalysisService {
    pub fn new(fetcher: LogFetcher, analyzer: LlmAnalyzer, renderer: ReportRenderer) -> Self {
        Self {
            fetcher,
            analyzer,
            renderer,
        }
    }

    /// Build every collaborator from settings. Misconfiguration surfaces here
    /// as `SourceUnavailable` or `ModelUnavailable`.
    pub fn from_settings(settings: &Settings) -> OnCallResult<Self> {
        Ok(Self::new(
            LogFetcher::from_settings(settings)?,
            LlmAnalyzer::from_settings(settings)?,
            ReportRenderer::from_settings(settings),
        ))
    }

    /// Run the pipeline. Any failure comes back as `AnalysisFailed`.
    pub async fn analyze(&self, request: &AnalysisRequest) -> OnCallResult<AnalysisResult> {
        let analysis_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        let mut stage = AnalysisStage::Started;

        info!(
            analysis_id = %analysis_id,
            hours_back = request.hours_back,
            focus_on_errors = request.focus_on_errors,
            "Starting log analysis"
        );

        match self.run(&analysis_id, timestamp, request, &mut stage).await {
            Ok(result) => {
                info!(
                    analysis_id = %analysis_id,
                    findings_count = result.findings.len(),
                    document_path = ?result.document_path,
                    "Log analysis completed successfully"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    analysis_id = %analysis_id,
                    state = ?AnalysisStage::Failed,
                    stage = ?stage,
                    error = %e,
                    "Log analysis failed"
                );
                Err(OnCallError::AnalysisFailed {
                    analysis_id,
                    stage,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn run(
        &self,
        analysis_id: &str,
        timestamp: DateTime<Utc>,
        request: &AnalysisRequest,
        stage: &mut AnalysisStage,
    ) -> OnCallResult<AnalysisResult> {
        let entries = self.fetch(request).await?;
        *stage = AnalysisStage::Fetched;

        if entries.is_empty() {
            warn!(analysis_id, "No logs found for analysis");
            *stage = AnalysisStage::Done;
            return Ok(empty_result(analysis_id, timestamp, request.hours_back));
        }

        let statistics = compute_statistics(&entries, request.hours_back);
        let analysis = self.analyzer.analyze(&entries, &statistics).await?;
        *stage = AnalysisStage::Analyzed;

        let content = ReportContent {
            analysis_id,
            timestamp,
            statistics: &statistics,
            findings: &analysis.findings,
            summary: &analysis.summary,
            recommendations: &analysis.recommendations,
            most_common_errors: &analysis.most_common_errors,
            document_path: None,
        };
        let document_path = self.renderer.render(&content, request.output_format)?;
        *stage = AnalysisStage::Rendered;

        let result = AnalysisResult {
            analysis_id: analysis_id.to_string(),
            timestamp,
            statistics,
            findings: analysis.findings,
            summary: analysis.summary,
            recommendations: analysis.recommendations,
            most_common_errors: analysis.most_common_errors,
            document_path: Some(document_path),
        };
        *stage = AnalysisStage::Done;
        Ok(result)
    }

    async fn fetch(&self, request: &AnalysisRequest) -> OnCallResult<Vec<LogEntry>> {
        if request.focus_on_errors {
            self.fetcher
                .fetch_error_or_warning(request.hours_back, request.max_logs)
                .await
        } else {
            self.fetcher
                .fetch(
                    request.filter_query.as_deref(),
                    request.hours_back,
                    request.max_logs,
                )
                .await
        }
    }
}

fn empty_result(analysis_id: &str, timestamp: DateTime<Utc>, hours_back: u32) -> AnalysisResult {
    AnalysisResult {
        analysis_id: analysis_id.to_string(),
        timestamp,
        statistics: Statistics::empty(hours_back),
        findings: Vec::new(),
        summary: EMPTY_SUMMARY.to_string(),
        recommendations: vec![EMPTY_RECOMMENDATION.to_string()],
        most_common_errors: Vec::new(),
        document_path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_provider::testing::StaticProvider;
    use crate::error::BoxError;
    use crate::log_source::{LogQuery, LogSource, RawLogEntry};
    use crate::models::FindingSeverity;
    use std::sync::{Arc, Mutex};

    struct FakeSource {
        entries: Result<Vec<RawLogEntry>, String>,
        queries: Arc<Mutex<Vec<LogQuery>>>,
    }

    #[async_trait::async_trait]
    impl LogSource for FakeSource {
        async fn list_entries(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, BoxError> {
            self.queries.lock().unwrap().push(query.clone());
            self.entries.clone().map_err(Into::into)
        }
    }

    fn raw(severity: &str, text: &str) -> RawLogEntry {
        RawLogEntry {
            timestamp: Some("2024-01-15T10:30:00Z".to_string()),
            severity: Some(severity.to_string()),
            log_name: Some("projects/test-project/logs/app".to_string()),
            text_payload: Some(text.to_string()),
            insert_id: Some(text.to_string()),
            ..Default::default()
        }
    }

    struct Harness {
        service: AnalysisService,
        queries: Arc<Mutex<Vec<LogQuery>>>,
        prompts: Arc<Mutex<Vec<crate::ai_provider::Prompt>>>,
        _dir: tempfile::TempDir,
    }

    fn harness(entries: Result<Vec<RawLogEntry>, String>, provider: StaticProvider) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        harness_in(entries, provider, ReportRenderer::new(dir.path().join("reports")), dir)
    }

    fn harness_in(
        entries: Result<Vec<RawLogEntry>, String>,
        provider: StaticProvider,
        renderer: ReportRenderer,
        dir: tempfile::TempDir,
    ) -> Harness {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let prompts = Arc::clone(&provider.prompts);
        let source = FakeSource {
            entries,
            queries: Arc::clone(&queries),
        };
        let service = AnalysisService::new(
            LogFetcher::new(Box::new(source), r#"resource.type="cloud_run_revision""#, 100),
            LlmAnalyzer::new(Box::new(provider), 50),
            renderer,
        );
        Harness {
            service,
            queries,
            prompts,
            _dir: dir,
        }
    }

    const MODEL_REPLY: &str = r#"```json
{
  "summary": "Database connectivity is degraded",
  "findings": [
    {"severity": "critical", "title": "Connection failures", "description": "Pool exhausted",
     "affected_logs_count": 2, "suggested_fix": "Raise pool size"},
    {"title": "Missing severity"},
    {"severity": "medium", "title": "Slow responses", "suggested_fix": "Add caching"}
  ],
  "recommendations": ["Add connection metrics"],
  "most_common_errors": ["Database connection failed"]
}
```"#;

    #[tokio::test]
    async fn test_empty_fetch_short_circuits() {
        let h = harness(Ok(vec![]), StaticProvider::replying(MODEL_REPLY));
        let result = h.service.analyze(&AnalysisRequest::default()).await.unwrap();

        assert_eq!(result.statistics.total_logs, 0);
        assert!(result.statistics.by_severity.is_empty());
        assert_eq!(result.statistics.time_range_hours, 24);
        assert!(result.findings.is_empty());
        assert!(result.document_path.is_none());
        assert_eq!(result.summary, EMPTY_SUMMARY);
        assert_eq!(result.recommendations, vec![EMPTY_RECOMMENDATION]);
        assert!(h.prompts.lock().unwrap().is_empty());
        assert!(!h.service.renderer.output_dir().exists());
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let entries = vec![
            raw("ERROR", "Database connection failed"),
            raw("WARNING", "High memory usage"),
            raw("ERROR", "API timeout error"),
        ];
        let h = harness(Ok(entries), StaticProvider::replying(MODEL_REPLY));
        let request = AnalysisRequest {
            hours_back: 6,
            output_format: OutputFormat::Json,
            ..AnalysisRequest::default()
        };

        let result = h.service.analyze(&request).await.unwrap();

        assert!(Uuid::parse_str(&result.analysis_id).is_ok());
        assert_eq!(result.statistics.total_logs, 3);
        assert_eq!(result.statistics.by_severity.get("ERROR"), Some(2));
        assert_eq!(result.statistics.time_range_hours, 6);
        assert_eq!(result.summary, "Database connectivity is degraded");

        let titles: Vec<&str> = result.findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Connection failures", "Slow responses"]);
        assert_eq!(result.findings[1].severity, FindingSeverity::Medium);
        assert_eq!(result.most_common_errors, vec!["Database connection failed"]);

        let path = result.document_path.clone().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("analysis_{}.json", result.analysis_id)
        );
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["analysis_id"], result.analysis_id.as_str());
        assert_eq!(written["findings"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_model_reply_still_renders() {
        let h = harness(
            Ok(vec![raw("ERROR", "boom")]),
            StaticProvider::replying("The logs look bad but I cannot format JSON."),
        );
        let result = h.service.analyze(&AnalysisRequest::default()).await.unwrap();

        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, FindingSeverity::Info);
        assert_eq!(
            result.findings[0].description,
            "The logs look bad but I cannot format JSON."
        );
        assert!(result.document_path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_focus_on_errors_ignores_request_filter() {
        let h = harness(Ok(vec![raw("ERROR", "a")]), StaticProvider::replying("{}"));

        let focused = AnalysisRequest {
            filter_query: Some(r#"logName:"app""#.to_string()),
            max_logs: Some(10),
            ..AnalysisRequest::default()
        };
        h.service.analyze(&focused).await.unwrap();

        let all = AnalysisRequest {
            focus_on_errors: false,
            ..focused.clone()
        };
        h.service.analyze(&all).await.unwrap();

        let queries = h.queries.lock().unwrap();
        assert!(queries[0].filter.ends_with(r#"AND severity >= "WARNING""#));
        assert!(!queries[0].filter.contains("logName"));
        assert_eq!(queries[0].page_size, 10);
        assert!(queries[1].filter.ends_with(r#"AND logName:"app""#));
        assert!(!queries[1].filter.contains("cloud_run_revision"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_wrapped() {
        let h = harness(Err("permission denied".to_string()), StaticProvider::replying("{}"));
        let err = h.service.analyze(&AnalysisRequest::default()).await.unwrap_err();

        match &err {
            OnCallError::AnalysisFailed {
                analysis_id, stage, ..
            } => {
                assert!(Uuid::parse_str(analysis_id).is_ok());
                assert_eq!(*stage, AnalysisStage::Started);
            }
            other => panic!("expected AnalysisFailed, got {:?}", other),
        }
        assert_eq!(err.code(), "ANALYSIS_ERROR");
        assert_eq!(err.root().code(), "GCP_LOG_FETCH_ERROR");
        assert!(err.to_string().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_model_failure_is_wrapped() {
        let h = harness(
            Ok(vec![raw("ERROR", "a")]),
            StaticProvider::failing("HTTP 503: overloaded"),
        );
        let err = h.service.analyze(&AnalysisRequest::default()).await.unwrap_err();

        assert!(matches!(
            err,
            OnCallError::AnalysisFailed {
                stage: AnalysisStage::Fetched,
                ..
            }
        ));
        assert!(err.root().is_model());
    }

    #[tokio::test]
    async fn test_render_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, "file").unwrap();

        let h = harness_in(
            Ok(vec![raw("ERROR", "a")]),
            StaticProvider::replying("{}"),
            ReportRenderer::new(&blocker),
            dir,
        );
        let err = h.service.analyze(&AnalysisRequest::default()).await.unwrap_err();

        assert!(matches!(
            err,
            OnCallError::AnalysisFailed {
                stage: AnalysisStage::Analyzed,
                ..
            }
        ));
        assert_eq!(err.root().code(), "DOCUMENT_WRITE_ERROR");
    }

    #[tokio::test]
    async fn test_each_run_gets_a_fresh_id() {
        let h = harness(Ok(vec![]), StaticProvider::replying("{}"));
        let first = h.service.analyze(&AnalysisRequest::default()).await.unwrap();
        let second = h.service.analyze(&AnalysisRequest::default()).await.unwrap();
        assert_ne!(first.analysis_id, second.analysis_id);
    }

    #[test]
    fn test_request_defaults() {
        let request: AnalysisRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, AnalysisRequest::default());
        assert_eq!(request.hours_back, 24);
        assert!(request.focus_on_errors);
        assert_eq!(request.output_format, OutputFormat::Markdown);
    }
}
