use crate::ai_provider::Prompt;
use crate::models::{LogEntry, LogPayload, Statistics};

pub struct SystemPromptGenerator;

impl SystemPromptGenerator {
    /// Full prompt for one analysis; entries past `max_entries` are dropped.
    pub fn build_prompt(entries: &[LogEntry], statistics: &Statistics, max_entries: usize) -> Prompt {
        let kept = &entries[..entries.len().min(max_entries)];
        Prompt {
            system: Self::generate_system_prompt().to_string(),
            user: Self::create_analysis_prompt(&Self::format_log_entries(kept), statistics),
        }
    }

    pub fn generate_system_prompt() -> &'static str {
        r#"You are an expert system reliability engineer and log analyst.
Your task is to analyze GCP Cloud Logging entries and identify issues, errors, and patterns.

Provide your analysis in the following JSON format:
{
  "summary": "Brief executive summary of the overall log analysis",
  "findings": [
    {
      "severity": "critical|high|medium|low|info",
      "title": "Short title of the finding",
      "description": "Detailed description of the issue",
      "affected_logs_count": number,
      "suggested_fix": "Concrete steps to fix or mitigate the issue",
      "code_example": "Code example if applicable (optional)"
    }
  ],
  "recommendations": [
    "General recommendation 1",
    "General recommendation 2"
  ],
  "most_common_errors": [
    "Error pattern 1",
    "Error pattern 2"
  ]
}

Focus on:
1. Identifying error patterns and root causes
2. Suggesting concrete, actionable fixes
3. Prioritizing findings by severity and impact
4. Providing code examples when relevant
5. Explaining the business/operational impact"#
    }

    pub fn create_analysis_prompt(log_block: &str, statistics: &Statistics) -> String {
        let severity_breakdown = serde_json::to_string_pretty(&statistics.by_severity)
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            r#"Please analyze the following GCP logs and provide findings and recommendations.

Statistics:
- Total logs analyzed: {}
- Time range: {} hours
- Severity breakdown: {}

Logs:
{}

Provide your analysis in the specified JSON format."#,
            statistics.total_logs, statistics.time_range_hours, severity_breakdown, log_block
        )
    }

    /// One numbered block per entry, separated by blank lines.
    pub fn format_log_entries(entries: &[LogEntry]) -> String {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| Self::format_log_entry(i + 1, entry))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_log_entry(number: usize, entry: &LogEntry) -> String {
        let mut text = format!("Log #{}:\n", number);
        text.push_str(&format!(
            "  Timestamp: {}\n",
            entry.timestamp.as_deref().unwrap_or("N/A")
        ));
        text.push_str(&format!("  Severity: {}\n", entry.severity));
        text.push_str(&format!("  Log Name: {}\n", or_na(&entry.log_name)));

        match &entry.payload {
            Some(LogPayload::Text(message)) if !message.is_empty() => {
                text.push_str(&format!("  Message: {}\n", message));
            }
            Some(LogPayload::Json(map)) if !map.is_empty() => {
                let pretty = serde_json::to_string_pretty(map).unwrap_or_default();
                text.push_str(&format!("  JSON: {}\n", pretty));
            }
            _ => {}
        }

        let resource = &entry.resource;
        if resource.resource_type.is_some() || !resource.labels.is_empty() {
            text.push_str(&format!(
                "  Resource Type: {}\n",
                resource.resource_type.as_deref().unwrap_or("N/A")
            ));
        }

        text
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
