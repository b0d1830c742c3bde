//! Log source adapter: time-window filters, Cloud Logging queries and
//! normalization of wire entries into [`LogEntry`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::{codes, BoxError, OnCallError, OnCallResult};
use crate::models::{LogEntry, LogPayload, LogResource, Statistics, UNKNOWN_SEVERITY};
use crate::statistics::compute_statistics;

pub mod auth;
pub mod cloud_logging;

pub use auth::TokenSource;
pub use cloud_logging::CloudLoggingClient;

pub const ERROR_OR_WARNING_FILTER: &str = r#"severity >= "WARNING""#;

/// Cloud Logging severities in ascending order.
const SEVERITY_ORDER: [&str; 9] = [
    "DEFAULT",
    "DEBUG",
    "INFO",
    "NOTICE",
    "WARNING",
    "ERROR",
    "CRITICAL",
    "ALERT",
    "EMERGENCY",
];

/// Position of `severity` in the Cloud Logging ordering, `None` when unranked.
pub fn severity_rank(severity: &str) -> Option<usize> {
    SEVERITY_ORDER.iter().position(|s| *s == severity)
}

pub fn is_warning_or_above(severity: &str) -> bool {
    match (severity_rank(severity), severity_rank("WARNING")) {
        (Some(rank), Some(threshold)) => rank >= threshold,
        _ => false,
    }
}

/// One `entries:list` style query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub filter: String,
    pub page_size: u32,
}

/// Entry as returned by the Cloud Logging API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEntry {
    pub timestamp: Option<String>,
    pub severity: Option<String>,
    pub log_name: Option<String>,
    pub resource: Option<RawResource>,
    pub text_payload: Option<String>,
    pub json_payload: Option<serde_json::Map<String, serde_json::Value>>,
    pub proto_payload: Option<serde_json::Map<String, serde_json::Value>>,
    pub labels: Option<HashMap<String, String>>,
    pub insert_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResource {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub labels: Option<HashMap<String, String>>,
}

impl From<RawLogEntry> for LogEntry {
    fn from(raw: RawLogEntry) -> Self {
        let payload = match (raw.text_payload, raw.json_payload, raw.proto_payload) {
            (Some(text), _, _) => Some(LogPayload::Text(text)),
            (None, Some(json), _) => Some(LogPayload::Json(json)),
            (None, None, Some(proto)) => Some(LogPayload::Json(proto)),
            (None, None, None) => None,
        };

        let resource = raw
            .resource
            .map(|r| LogResource {
                resource_type: r.resource_type,
                labels: r.labels.unwrap_or_default(),
            })
            .unwrap_or_default();

        LogEntry {
            timestamp: raw.timestamp,
            severity: raw
                .severity
                .unwrap_or_else(|| UNKNOWN_SEVERITY.to_string()),
            log_name: raw.log_name.unwrap_or_default(),
            resource,
            payload,
            labels: raw.labels.unwrap_or_default(),
            insert_id: raw.insert_id.unwrap_or_default(),
        }
    }
}

/// Query transport behind the adapter.
#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    async fn list_entries(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, BoxError>;
}

/// `timestamp >= "<now - hours_back>"` in Cloud Logging filter syntax.
pub fn build_timestamp_filter(now: DateTime<Utc>, hours_back: u32) -> String {
    let start_time = now - Duration::hours(i64::from(hours_back));
    format!(
        r#"timestamp >= "{}""#,
        start_time.format("%Y-%m-%dT%H:%M:%SZ")
    )
}

/// Fetches and normalizes log entries for one analysis.
pub struct LogFetcher {
    source: Box<dyn LogSource>,
    default_filter: String,
    default_limit: u32,
}

impl LogFetcher {
    pub fn new(source: Box<dyn LogSource>, default_filter: impl Into<String>, default_limit: u32) -> Self {
        Self {
            source,
            default_filter: default_filter.into(),
            default_limit,
        }
    }

    /// Build the Cloud Logging client described by `settings`.
    pub fn from_settings(settings: &Settings) -> OnCallResult<Self> {
        let client = CloudLoggingClient::from_settings(settings)?;
        Ok(Self::new(
            Box::new(client),
            settings.gcp_log_filter.clone(),
            settings.gcp_log_limit,
        ))
    }

    /// Combine the time bound with the request filter or, failing that, the
    /// stored default filter. A request filter replaces the default.
    pub fn build_filter(&self, filter: Option<&str>, now: DateTime<Utc>, hours_back: u32) -> String {
        let timestamp_filter = build_timestamp_filter(now, hours_back);
        let request_filter = filter.map(str::trim).filter(|f| !f.is_empty());
        let default_filter = Some(self.default_filter.trim()).filter(|f| !f.is_empty());

        match request_filter.or(default_filter) {
            Some(extra) => format!("{} AND {}", timestamp_filter, extra),
            None => timestamp_filter,
        }
    }

    pub async fn fetch(
        &self,
        filter: Option<&str>,
        hours_back: u32,
        max_results: Option<u32>,
    ) -> OnCallResult<Vec<LogEntry>> {
        let query = LogQuery {
            filter: self.build_filter(filter, Utc::now(), hours_back),
            page_size: max_results.unwrap_or(self.default_limit),
        };

        info!(
            filter = %query.filter,
            hours_back,
            max_results = query.page_size,
            "Fetching logs from GCP"
        );

        let raw_entries = self.source.list_entries(&query).await.map_err(|e| {
            error!(error = %e, "Failed to fetch logs from GCP");
            OnCallError::FetchFailed {
                code: codes::GCP_LOG_FETCH_ERROR,
                message: format!("Failed to fetch logs: {}", e),
                source: Some(e),
            }
        })?;

        let entries: Vec<LogEntry> = raw_entries.into_iter().map(LogEntry::from).collect();
        info!(count = entries.len(), "Successfully fetched logs from GCP");
        Ok(entries)
    }

    /// Entries at `WARNING` or above; any caller filter is ignored.
    pub async fn fetch_error_or_warning(
        &self,
        hours_back: u32,
        max_results: Option<u32>,
    ) -> OnCallResult<Vec<LogEntry>> {
        let mut entries = self
            .fetch(Some(ERROR_OR_WARNING_FILTER), hours_back, max_results)
            .await?;

        let before = entries.len();
        entries.retain(|entry| is_warning_or_above(&entry.severity));
        if entries.len() != before {
            debug!(
                dropped = before - entries.len(),
                "Discarded entries below WARNING returned by the log source"
            );
        }
        Ok(entries)
    }

    /// Severity breakdown of the window, using the stored default filter.
    pub async fn log_statistics(&self, hours_back: u32) -> OnCallResult<Statistics> {
        let entries = self.fetch(None, hours_back, None).await.map_err(|e| {
            error!(error = %e, "Failed to get log statistics");
            OnCallError::FetchFailed {
                code: codes::GCP_STATS_ERROR,
                message: format!("Failed to get log statistics: {}", e),
                source: Some(Box::new(e)),
            }
        })?;
        Ok(compute_statistics(&entries, hours_back))
    }
}
