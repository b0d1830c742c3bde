use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub const UNKNOWN_SEVERITY: &str = "UNKNOWN";

/// One normalized log record consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 timestamp, when the source reported one.
    pub timestamp: Option<String>,
    /// Open vocabulary, `UNKNOWN` when absent.
    pub severity: String,
    pub log_name: String,
    #[serde(default)]
    pub resource: LogResource,
    pub payload: Option<LogPayload>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub insert_id: String,
}

impl LogEntry {
    pub fn text_payload(&self) -> Option<&str> {
        match &self.payload {
            Some(LogPayload::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn json_payload(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match &self.payload {
            Some(LogPayload::Json(map)) => Some(map),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogResource {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Free text or a structured map, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogPayload {
    Text(String),
    Json(serde_json::Map<String, serde_json::Value>),
}

/// Severity tally keyed exactly as received, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityCounts(Vec<(String, usize)>);

impl SeverityCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, severity: &str) {
        match self.0.iter_mut().find(|(key, _)| key == severity) {
            Some((_, count)) => *count += 1,
            None => self.0.push((severity.to_string(), 1)),
        }
    }

    pub fn get(&self, severity: &str) -> Option<usize> {
        self.0
            .iter()
            .find(|(key, _)| key == severity)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(key, count)| (key.as_str(), *count))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|(key, _)| key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, count)| count).sum()
    }
}

impl Serialize for SeverityCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (severity, count) in &self.0 {
            map.serialize_entry(severity, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SeverityCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = SeverityCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of severity to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut counts = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((severity, count)) = access.next_entry::<String, usize>()? {
                    counts.push((severity, count));
                }
                Ok(SeverityCounts(counts))
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

/// Derived once per run, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_logs: usize,
    pub by_severity: SeverityCounts,
    pub time_range_hours: u32,
}

impl Statistics {
    pub fn empty(time_range_hours: u32) -> Self {
        Self {
            total_logs: 0,
            by_severity: SeverityCounts::new(),
            time_range_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl FindingSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSeverity::Critical => "critical",
            FindingSeverity::High => "high",
            FindingSeverity::Medium => "medium",
            FindingSeverity::Low => "low",
            FindingSeverity::Info => "info",
        }
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum FindingError {
    #[error("finding is not a JSON object")]
    NotAnObject,
    #[error("finding violates schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// One issue surfaced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: FindingSeverity,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub affected_logs_count: u32,
    pub suggested_fix: String,
    #[serde(default)]
    pub code_example: Option<String>,
}

// Lenient shape accepted from the model: everything but `severity` may be
// omitted, but present fields must have the right type.
#[derive(Deserialize)]
struct RawFinding {
    severity: FindingSeverity,
    #[serde(default = "default_title")]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "lenient_count")]
    affected_logs_count: u32,
    #[serde(default)]
    suggested_fix: String,
    #[serde(default)]
    code_example: Option<String>,
}

fn default_title() -> String {
    "Unknown issue".to_string()
}

// Models often answer `3.0` or `"5"` for a count. Integral floats and numeric
// strings are accepted; negatives, fractions and other types are not.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    use serde::de::Error;

    fn integral(n: f64) -> Option<u32> {
        (n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&n)).then(|| n as u32)
    }

    let value = serde_json::Value::deserialize(deserializer)?;
    let count = match &value {
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(n) => u32::try_from(n).ok(),
            None => n.as_f64().and_then(integral),
        },
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u32>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    count.ok_or_else(|| {
        D::Error::custom(format!("invalid affected_logs_count: {}", value))
    })
}

impl TryFrom<&serde_json::Value> for Finding {
    type Error = FindingError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(FindingError::NotAnObject);
        }
        let raw = RawFinding::deserialize(value)?;
        Ok(Finding {
            severity: raw.severity,
            title: raw.title,
            description: raw.description,
            affected_logs_count: raw.affected_logs_count,
            suggested_fix: raw.suggested_fix,
            code_example: raw.code_example,
        })
    }
}

/// Outcome of one analysis run. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
    pub findings: Vec<Finding>,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub most_common_errors: Vec<String>,
    pub document_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_counts_keep_first_seen_order() {
        let mut counts = SeverityCounts::new();
        for severity in ["WARNING", "ERROR", "error", "ERROR"] {
            counts.increment(severity);
        }
        assert_eq!(counts.keys(), vec!["WARNING", "ERROR", "error"]);
        assert_eq!(counts.get("ERROR"), Some(2));
        assert_eq!(counts.get("error"), Some(1));
        assert_eq!(counts.total(), 4);

        let encoded = serde_json::to_string(&counts).unwrap();
        assert_eq!(encoded, r#"{"WARNING":1,"ERROR":2,"error":1}"#);
        let decoded: SeverityCounts = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, counts);
    }

    #[test]
    fn test_finding_defaults_optional_fields() {
        let finding = Finding::try_from(&json!({"severity": "high"})).unwrap();
        assert_eq!(finding.severity, FindingSeverity::High);
        assert_eq!(finding.title, "Unknown issue");
        assert_eq!(finding.affected_logs_count, 0);
        assert_eq!(finding.suggested_fix, "");
        assert!(finding.code_example.is_none());
    }

    #[test]
    fn test_finding_rejects_schema_violations() {
        assert!(Finding::try_from(&json!({"title": "no severity"})).is_err());
        assert!(Finding::try_from(&json!({"severity": "urgent"})).is_err());
        assert!(Finding::try_from(&json!({"severity": "Critical"})).is_err());
        assert!(Finding::try_from(&json!({"severity": "low", "affected_logs_count": -1})).is_err());
        assert!(Finding::try_from(&json!({"severity": "low", "title": null})).is_err());
        assert!(matches!(
            Finding::try_from(&json!("critical")),
            Err(FindingError::NotAnObject)
        ));
    }

    #[test]
    fn test_finding_accepts_integral_float_count() {
        let finding = Finding::try_from(&json!({
            "severity": "high",
            "title": "Connection resets",
            "affected_logs_count": 3.0
        }))
        .unwrap();
        assert_eq!(finding.affected_logs_count, 3);
    }

    #[test]
    fn test_finding_accepts_numeric_string_count() {
        let finding = Finding::try_from(&json!({
            "severity": "medium",
            "title": "Slow queries",
            "affected_logs_count": "5"
        }))
        .unwrap();
        assert_eq!(finding.affected_logs_count, 5);
    }

    #[test]
    fn test_finding_rejects_bad_counts() {
        for count in [json!(2.5), json!(-3.0), json!("many"), json!("-1"), json!(true)] {
            let raw = json!({"severity": "low", "affected_logs_count": count});
            assert!(Finding::try_from(&raw).is_err(), "accepted {}", raw);
        }
    }

    #[test]
    fn test_payload_accessors() {
        let entry = LogEntry {
            timestamp: None,
            severity: UNKNOWN_SEVERITY.to_string(),
            log_name: "projects/p/logs/app".to_string(),
            resource: LogResource::default(),
            payload: Some(LogPayload::Text("boom".to_string())),
            labels: HashMap::new(),
            insert_id: "1".to_string(),
        };
        assert_eq!(entry.text_payload(), Some("boom"));
        assert!(entry.json_payload().is_none());
    }
}
