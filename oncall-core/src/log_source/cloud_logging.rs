use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use super::auth::{AuthError, TokenSource};
use super::{LogQuery, LogSource, RawLogEntry};
use crate::config::Settings;
use crate::error::{codes, BoxError, OnCallError, OnCallResult};

/// Largest page the `entries:list` API accepts.
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum LoggingApiError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesRequest<'a> {
    resource_names: Vec<String>,
    filter: &'a str,
    order_by: &'static str,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesResponse {
    #[serde(default)]
    entries: Vec<RawLogEntry>,
    next_page_token: Option<String>,
}

/// Google Cloud Logging REST client (`entries:list`).
#[derive(Debug)]
pub struct CloudLoggingClient {
    client: Client,
    endpoint: String,
    project_id: String,
    token_source: TokenSource,
}

impl CloudLoggingClient {
    pub fn new(
        project_id: impl Into<String>,
        endpoint: impl Into<String>,
        token_source: TokenSource,
    ) -> OnCallResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| OnCallError::SourceUnavailable {
                code: codes::GCP_CLIENT_INIT_ERROR,
                message: format!("Failed to initialize GCP Logging client: {}", e),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            token_source,
        })
    }

    /// Resolve project and credentials from settings.
    ///
    /// Token precedence: explicit access token, then service-account key,
    /// then the metadata server.
    pub fn from_settings(settings: &Settings) -> OnCallResult<Self> {
        let project_id = settings
            .gcp_project_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                error!("GCP project ID not configured");
                OnCallError::source_unavailable(
                    codes::GCP_PROJECT_ID_MISSING,
                    "GCP project ID not configured",
                )
            })?;

        let token_source = if let Some(token) = &settings.gcp_access_token {
            TokenSource::Static(token.clone())
        } else if let Some(credentials) = &settings.gcp_credentials_json {
            TokenSource::from_credentials(credentials).map_err(|e| {
                error!(error = %e, "Failed to initialize GCP Logging client");
                OnCallError::SourceUnavailable {
                    code: codes::GCP_CLIENT_INIT_ERROR,
                    message: format!("Failed to initialize GCP Logging client: {}", e),
                    source: Some(Box::new(e)),
                }
            })?
        } else {
            TokenSource::metadata()
        };

        let client = Self::new(project_id, &settings.gcp_logging_endpoint, token_source)?;
        info!(project_id = %client.project_id, "GCP Logging client initialized");
        Ok(client)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn list_page(
        &self,
        token: &str,
        request: &ListEntriesRequest<'_>,
    ) -> Result<ListEntriesResponse, LoggingApiError> {
        let response = self
            .client
            .post(format!("{}/v2/entries:list", self.endpoint))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LoggingApiError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    async fn list_all(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, LoggingApiError> {
        let token = self.token_source.access_token(&self.client).await?;
        let wanted = query.page_size as usize;
        let mut entries = Vec::new();
        let mut page_token = None;

        while entries.len() < wanted {
            let remaining = (wanted - entries.len()) as u32;
            let request = ListEntriesRequest {
                resource_names: vec![format!("projects/{}", self.project_id)],
                filter: &query.filter,
                order_by: "timestamp desc",
                page_size: remaining.min(MAX_PAGE_SIZE),
                page_token: page_token.take(),
            };

            let page = self.list_page(&token, &request).await?;
            debug!(count = page.entries.len(), "Received log entries page");
            entries.extend(page.entries);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        entries.truncate(wanted);
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl LogSource for CloudLoggingClient {
    async fn list_entries(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, BoxError> {
        Ok(self.list_all(query).await?)
    }
}
