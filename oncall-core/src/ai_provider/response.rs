//! Normalization of free-form model output into the findings schema.
//!
//! Steps run in a fixed order: trim, strip the code fence, parse, then
//! backfill or fall back. Nothing in here returns an error.

use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::models::Finding;

pub const DEFAULT_SUMMARY: &str = "Analysis completed";
pub const FALLBACK_SUMMARY: &str = "Analysis completed but response parsing failed";
pub const FALLBACK_TITLE: &str = "Analysis Result";
pub const FALLBACK_FIX: &str = "Manual review required";
pub const FALLBACK_RECOMMENDATION: &str = "Review logs manually";

const FALLBACK_DESCRIPTION_CHARS: usize = 1000;
const LOGGED_RESPONSE_CHARS: usize = 500;

/// Top-level shape after parsing; findings are still unvalidated JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub summary: String,
    pub findings: Vec<Value>,
    pub recommendations: Vec<String>,
    pub most_common_errors: Vec<String>,
}

/// Parsed response with findings materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAnalysis {
    pub summary: String,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<String>,
    pub most_common_errors: Vec<String>,
}

impl From<ParsedResponse> for ModelAnalysis {
    fn from(parsed: ParsedResponse) -> Self {
        Self {
            findings: materialize_findings(&parsed.findings),
            summary: parsed.summary,
            recommendations: parsed.recommendations,
            most_common_errors: parsed.most_common_errors,
        }
    }
}

/// Remove one surrounding markdown fence.
///
/// Only a `json` language tag is recognized; other tags are left in place
/// and make the parse fail into the fallback.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

pub fn parse_model_response(raw: &str) -> ParsedResponse {
    let text = strip_code_fence(raw);

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => backfill(object),
        Ok(other) => {
            error!(
                kind = json_kind(&other),
                response = %prefix(text, LOGGED_RESPONSE_CHARS),
                "LLM response is JSON but not an object"
            );
            fallback(raw)
        }
        Err(e) => {
            error!(
                error = %e,
                response = %prefix(text, LOGGED_RESPONSE_CHARS),
                "Failed to parse LLM response as JSON"
            );
            fallback(raw)
        }
    }
}

/// Validate raw findings one by one, dropping the ones that do not fit.
pub fn materialize_findings(raw: &[Value]) -> Vec<Finding> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, value)| match Finding::try_from(value) {
            Ok(finding) => Some(finding),
            Err(e) => {
                warn!(index, error = %e, "Skipping invalid finding");
                None
            }
        })
        .collect()
}

fn backfill(mut object: Map<String, Value>) -> ParsedResponse {
    let summary = match object.remove("summary") {
        None => DEFAULT_SUMMARY.to_string(),
        Some(Value::String(summary)) => summary,
        Some(other) => other.to_string(),
    };

    let findings = match object.remove("findings") {
        Some(Value::Array(items)) => items,
        None => Vec::new(),
        Some(other) => {
            warn!(kind = json_kind(&other), "Ignoring non-array findings");
            Vec::new()
        }
    };

    ParsedResponse {
        summary,
        findings,
        recommendations: string_list(object.remove("recommendations"), "recommendations"),
        most_common_errors: string_list(object.remove("most_common_errors"), "most_common_errors"),
    }
}

fn string_list(value: Option<Value>, field: &str) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                other => {
                    warn!(field, kind = json_kind(&other), "Dropping non-string item");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(field, kind = json_kind(&other), "Ignoring non-array field");
            Vec::new()
        }
    }
}

fn fallback(raw: &str) -> ParsedResponse {
    ParsedResponse {
        summary: FALLBACK_SUMMARY.to_string(),
        findings: vec![json!({
            "severity": "info",
            "title": FALLBACK_TITLE,
            "description": prefix(raw, FALLBACK_DESCRIPTION_CHARS),
            "affected_logs_count": 0,
            "suggested_fix": FALLBACK_FIX,
        })],
        recommendations: vec![FALLBACK_RECOMMENDATION.to_string()],
        most_common_errors: Vec::new(),
    }
}

/// First `max_chars` characters, never splitting a code point.
fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FindingSeverity;

    const BODY: &str = r#"{
  "summary": "Database connectivity is degraded",
  "findings": [
    {"severity": "critical", "title": "Connection pool exhausted", "description": "Pool at 100%",
     "affected_logs_count": 12, "suggested_fix": "Raise the pool size", "code_example": "pool_size = 50"}
  ],
  "recommendations": ["Add connection metrics"],
  "most_common_errors": ["Database connection failed"]
}"#;

    #[test]
    fn test_fenced_response_parses_like_plain_json() {
        let plain = parse_model_response(BODY);
        let fenced = parse_model_response(&format!("```json\n{}\n```", BODY));
        let bare_fence = parse_model_response(&format!("  ```\n{}\n```  \n", BODY));

        assert_eq!(plain, fenced);
        assert_eq!(plain, bare_fence);
        assert_eq!(plain.summary, "Database connectivity is degraded");
        assert_eq!(plain.findings.len(), 1);
    }

    #[test]
    fn test_missing_keys_are_backfilled() {
        let parsed = parse_model_response("{}");
        assert_eq!(parsed.summary, "Analysis completed");
        assert!(parsed.findings.is_empty());
        assert!(parsed.recommendations.is_empty());
        assert!(parsed.most_common_errors.is_empty());
    }

    #[test]
    fn test_malformed_response_falls_back() {
        let raw = format!("Sorry, {}", "x".repeat(1500));
        let analysis = ModelAnalysis::from(parse_model_response(&raw));

        assert_eq!(analysis.summary, FALLBACK_SUMMARY);
        assert_eq!(analysis.recommendations, vec!["Review logs manually"]);
        assert!(analysis.most_common_errors.is_empty());
        assert_eq!(analysis.findings.len(), 1);

        let finding = &analysis.findings[0];
        assert_eq!(finding.severity, FindingSeverity::Info);
        assert_eq!(finding.title, "Analysis Result");
        assert_eq!(finding.affected_logs_count, 0);
        assert_eq!(finding.suggested_fix, "Manual review required");
        assert_eq!(finding.description, raw.chars().take(1000).collect::<String>());
    }

    #[test]
    fn test_fallback_respects_char_boundaries() {
        let raw = "é".repeat(1200);
        let analysis = ModelAnalysis::from(parse_model_response(&raw));
        assert_eq!(analysis.findings[0].description.chars().count(), 1000);
    }

    #[test]
    fn test_non_object_json_falls_back() {
        let parsed = parse_model_response("[1, 2, 3]");
        assert_eq!(parsed.summary, FALLBACK_SUMMARY);
        assert_eq!(parsed.findings.len(), 1);
    }

    #[test]
    fn test_other_language_tag_is_not_stripped() {
        let parsed = parse_model_response("```javascript\n{\"summary\": \"x\"}\n```");
        assert_eq!(parsed.summary, FALLBACK_SUMMARY);
    }

    #[test]
    fn test_wrongly_typed_fields_are_repaired() {
        let parsed = parse_model_response(
            r#"{"summary": 42, "findings": {"severity": "low"}, "recommendations": ["a", 1, "b"], "most_common_errors": "boom"}"#,
        );
        assert_eq!(parsed.summary, "42");
        assert!(parsed.findings.is_empty());
        assert_eq!(parsed.recommendations, vec!["a", "b"]);
        assert!(parsed.most_common_errors.is_empty());
    }

    #[test]
    fn test_invalid_findings_are_skipped_in_order() {
        let parsed = parse_model_response(
            r#"{"findings": [
                {"severity": "high", "title": "first"},
                {"title": "missing severity"},
                {"severity": "HIGH", "title": "wrong case"},
                "not an object",
                {"severity": "low", "title": "second"}
            ]}"#,
        );
        let findings = materialize_findings(&parsed.findings);
        let titles: Vec<&str> = findings.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }
}
