use super::{severity_marker, OutputGenerator, ReportContent};
use anyhow::Result;
use askama::Template;

#[derive(Template)]
#[template(path = "report.md")]
struct MarkdownTemplate<'a> {
    analysis_id: &'a str,
    timestamp: String,
    summary: &'a str,
    total_logs: usize,
    time_range_hours: u32,
    severity_rows: Vec<SeverityRow<'a>>,
    findings: Vec<FindingView<'a>>,
    recommendations: &'a [String],
    most_common_errors: &'a [String],
}

struct SeverityRow<'a> {
    name: &'a str,
    count: usize,
}

struct FindingView<'a> {
    marker: &'static str,
    severity: &'static str,
    title: &'a str,
    description: &'a str,
    affected_logs_count: u32,
    suggested_fix: &'a str,
    has_code: bool,
    code: &'a str,
}

pub struct MarkdownOutput;

impl OutputGenerator for MarkdownOutput {
    fn generate(&self, report: &ReportContent<'_>) -> Result<String> {
        let findings = report
            .findings
            .iter()
            .map(|finding| FindingView {
                marker: severity_marker(finding.severity.as_str()),
                severity: finding.severity.as_str(),
                title: &finding.title,
                description: &finding.description,
                affected_logs_count: finding.affected_logs_count,
                suggested_fix: &finding.suggested_fix,
                has_code: finding.code_example.is_some(),
                code: finding.code_example.as_deref().unwrap_or_default(),
            })
            .collect();

        let template = MarkdownTemplate {
            analysis_id: report.analysis_id,
            timestamp: report.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            summary: report.summary,
            total_logs: report.statistics.total_logs,
            time_range_hours: report.statistics.time_range_hours,
            severity_rows: report
                .statistics
                .by_severity
                .iter()
                .map(|(name, count)| SeverityRow { name, count })
                .collect(),
            findings,
            recommendations: report.recommendations,
            most_common_errors: report.most_common_errors,
        };

        template
            .render()
            .map_err(|e| anyhow::anyhow!("Template rendering failed: {}", e))
    }

    fn file_extension(&self) -> &str {
        "md"
    }
}
