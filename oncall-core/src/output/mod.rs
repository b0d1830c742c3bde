pub mod json;
pub mod markdown;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

use crate::config::Settings;
use crate::error::{codes, OnCallError, OnCallResult};
use crate::models::{AnalysisResult, Finding, Statistics};

use json::JsonOutput;
use markdown::MarkdownOutput;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Markdown, OutputFormat::Json];

    pub fn extension(&self) -> &'static str {
        self.generator().file_extension()
    }

    fn generator(&self) -> &'static dyn OutputGenerator {
        match self {
            OutputFormat::Markdown => &MarkdownOutput,
            OutputFormat::Json => &JsonOutput,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unsupported output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
        })
    }
}

/// Everything a report shows. Borrowed so rendering cannot alter the result.
#[derive(Debug, Clone, Serialize)]
pub struct ReportContent<'a> {
    pub analysis_id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub statistics: &'a Statistics,
    pub findings: &'a [Finding],
    pub summary: &'a str,
    pub recommendations: &'a [String],
    pub most_common_errors: &'a [String],
    pub document_path: Option<&'a Path>,
}

impl<'a> From<&'a AnalysisResult> for ReportContent<'a> {
    fn from(result: &'a AnalysisResult) -> Self {
        Self {
            analysis_id: &result.analysis_id,
            timestamp: result.timestamp,
            statistics: &result.statistics,
            findings: &result.findings,
            summary: &result.summary,
            recommendations: &result.recommendations,
            most_common_errors: &result.most_common_errors,
            document_path: result.document_path.as_deref(),
        }
    }
}

pub trait OutputGenerator: Sync {
    fn generate(&self, report: &ReportContent<'_>) -> Result<String>;
    fn file_extension(&self) -> &str;
}

/// Visual marker for a finding severity; unknown values get a neutral one.
pub fn severity_marker(severity: &str) -> &'static str {
    match severity {
        "critical" => "🔴",
        "high" => "🟠",
        "medium" => "🟡",
        "low" => "🟢",
        "info" => "ℹ️",
        _ => "⚪",
    }
}

/// Writes one report file per analysis under a fixed directory.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    output_dir: PathBuf,
}

impl ReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.analysis_output_dir.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn report_path(&self, analysis_id: &str, format: OutputFormat) -> PathBuf {
        self.output_dir
            .join(format!("analysis_{}.{}", analysis_id, format.extension()))
    }

    /// Existing report for `analysis_id`, in either format.
    pub fn find_report(&self, analysis_id: &str) -> Option<PathBuf> {
        OutputFormat::ALL
            .iter()
            .map(|format| self.report_path(analysis_id, *format))
            .find(|path| path.is_file())
    }

    /// Write the report; the written document records its own path.
    pub fn render(&self, report: &ReportContent<'_>, format: OutputFormat) -> OnCallResult<PathBuf> {
        let path = self.report_path(report.analysis_id, format);
        let report = ReportContent {
            document_path: Some(path.as_path()),
            ..report.clone()
        };

        let body = format
            .generator()
            .generate(&report)
            .map_err(|e| write_error("Failed to render analysis document", e.into()))?;

        fs::create_dir_all(&self.output_dir).map_err(|e| {
            write_error(
                &format!("Failed to create {}", self.output_dir.display()),
                Box::new(e),
            )
        })?;

        fs::write(&path, body).map_err(|e| {
            write_error(&format!("Failed to write {}", path.display()), Box::new(e))
        })?;

        info!(
            analysis_id = report.analysis_id,
            format = %format,
            path = %path.display(),
            "Analysis document generated"
        );
        Ok(path)
    }
}

fn write_error(message: &str, source: crate::error::BoxError) -> OnCallError {
    error!(error = %source, "{}", message);
    OnCallError::RenderFailed {
        code: codes::DOCUMENT_WRITE_ERROR,
        message: format!("{}: {}", message, source),
        source: Some(source),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_result;
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_severity_marker_mapping() {
        assert_eq!(severity_marker("critical"), "🔴");
        assert_eq!(severity_marker("high"), "🟠");
        assert_eq!(severity_marker("medium"), "🟡");
        assert_eq!(severity_marker("low"), "🟢");
        assert_eq!(severity_marker("info"), "ℹ️");
        assert_eq!(severity_marker("unknown"), "⚪");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("markdown".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("html".parse::<OutputFormat>().is_err());
        assert_eq!(serde_json::to_string(&OutputFormat::Json).unwrap(), "\"json\"");
    }

    #[test]
    fn test_render_creates_directory_and_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ReportRenderer::new(dir.path().join("nested").join("reports"));
        let result = sample_result();

        let path = renderer
            .render(&ReportContent::from(&result), OutputFormat::Markdown)
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "analysis_test-123.md");
        assert!(path.is_file());

        // Directory already exists on the second call.
        let path = renderer
            .render(&ReportContent::from(&result), OutputFormat::Json)
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "analysis_test-123.json");
        assert_eq!(renderer.find_report("test-123").unwrap().extension().unwrap(), "md");
        assert!(renderer.find_report("other").is_none());
    }

    #[test]
    fn test_formats_are_content_equivalent() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ReportRenderer::new(dir.path());
        let result = sample_result();
        let content = ReportContent::from(&result);

        let markdown =
            fs::read_to_string(renderer.render(&content, OutputFormat::Markdown).unwrap()).unwrap();
        let json: Value = serde_json::from_str(
            &fs::read_to_string(renderer.render(&content, OutputFormat::Json).unwrap()).unwrap(),
        )
        .unwrap();

        let json_findings = json["findings"].as_array().unwrap();
        assert_eq!(json_findings.len(), result.findings.len());
        for (finding, encoded) in result.findings.iter().zip(json_findings) {
            assert!(markdown.contains(&finding.title));
            assert!(markdown.contains(finding.severity.as_str()));
            assert!(markdown.contains(&finding.suggested_fix));
            assert_eq!(encoded["title"], finding.title.as_str());
            assert_eq!(encoded["severity"], finding.severity.as_str());
            assert_eq!(encoded["suggested_fix"], finding.suggested_fix.as_str());
        }
        for recommendation in &result.recommendations {
            assert!(markdown.contains(recommendation.as_str()));
        }
        assert_eq!(json["recommendations"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_json_document_records_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ReportRenderer::new(dir.path());
        let result = sample_result();

        let path = renderer
            .render(&ReportContent::from(&result), OutputFormat::Json)
            .unwrap();
        let stored: AnalysisResult =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(stored.document_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            AnalysisResult {
                document_path: None,
                ..stored
            },
            result
        );
    }

    #[test]
    fn test_write_failure_is_render_failed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "occupied").unwrap();

        let renderer = ReportRenderer::new(&blocker);
        let result = sample_result();
        let err = renderer
            .render(&ReportContent::from(&result), OutputFormat::Json)
            .unwrap_err();

        assert!(matches!(err, OnCallError::RenderFailed { .. }));
        assert_eq!(err.code(), "DOCUMENT_WRITE_ERROR");
        assert!(std::error::Error::source(&err).is_some());
    }
}
