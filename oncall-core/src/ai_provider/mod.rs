use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::Settings;
use crate::error::{codes, OnCallError, OnCallResult};
use crate::models::{LogEntry, Statistics};

pub mod claude;
pub mod openai;
pub mod prompts;
pub mod response;

pub use claude::ClaudeProvider;
pub use openai::OpenAIProvider;
pub use prompts::SystemPromptGenerator;
pub use response::{materialize_findings, parse_model_response, ModelAnalysis, ParsedResponse};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";

#[derive(Error, Debug)]
pub enum AIError {
    #[error("API request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Authentication failed")]
    AuthenticationError,
    #[error("Rate limited")]
    RateLimited,
}

/// System and user message pair sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Prompt-in, text-out model call. Parsing is the caller's job.
#[async_trait::async_trait]
pub trait AIProvider: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AIError>;
    fn get_provider_name(&self) -> &str;
}

/// The supported providers, chosen once from `Settings::llm_provider`.
#[derive(Debug)]
pub enum ModelBackend {
    OpenAi(OpenAIProvider),
    Anthropic(ClaudeProvider),
}

#[async_trait::async_trait]
impl AIProvider for ModelBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AIError> {
        match self {
            ModelBackend::OpenAi(provider) => provider.complete(prompt).await,
            ModelBackend::Anthropic(provider) => provider.complete(prompt).await,
        }
    }

    fn get_provider_name(&self) -> &str {
        match self {
            ModelBackend::OpenAi(provider) => provider.get_provider_name(),
            ModelBackend::Anthropic(provider) => provider.get_provider_name(),
        }
    }
}

fn configured_key<'a>(key: &'a Option<String>) -> Option<&'a str> {
    key.as_deref().map(str::trim).filter(|k| !k.is_empty())
}

fn init_error(e: AIError) -> OnCallError {
    error!(error = %e, "Failed to initialize LLM");
    OnCallError::ModelUnavailable {
        code: codes::LLM_INIT_ERROR,
        message: format!("Failed to initialize LLM: {}", e),
        source: Some(Box::new(e)),
    }
}

/// Resolve the provider named by `settings.llm_provider`.
///
/// The selected provider's API key must be present; nothing is sent over
/// the network here.
pub fn create_backend(settings: &Settings) -> OnCallResult<ModelBackend> {
    let timeout = Duration::from_secs(settings.llm_timeout_secs);

    match settings.llm_provider.trim().to_lowercase().as_str() {
        "openai" => {
            let api_key = configured_key(&settings.openai_api_key).ok_or_else(|| {
                OnCallError::model_unavailable(
                    codes::OPENAI_API_KEY_MISSING,
                    "OpenAI API key not configured",
                )
            })?;
            info!("Initializing OpenAI LLM");
            let provider = OpenAIProvider::new(api_key.to_string(), timeout)
                .map_err(init_error)?
                .with_model(
                    settings
                        .llm_model
                        .clone()
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                )
                .with_base_url(settings.openai_base_url.clone())
                .with_sampling(settings.llm_temperature, settings.llm_max_tokens);
            Ok(ModelBackend::OpenAi(provider))
        }
        "anthropic" | "claude" => {
            let api_key = configured_key(&settings.anthropic_api_key).ok_or_else(|| {
                OnCallError::model_unavailable(
                    codes::ANTHROPIC_API_KEY_MISSING,
                    "Anthropic API key not configured",
                )
            })?;
            info!("Initializing Anthropic LLM");
            let provider = ClaudeProvider::new(api_key.to_string(), timeout)
                .map_err(init_error)?
                .with_model(
                    settings
                        .llm_model
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                )
                .with_base_url(settings.anthropic_base_url.clone())
                .with_sampling(settings.llm_temperature, settings.llm_max_tokens);
            Ok(ModelBackend::Anthropic(provider))
        }
        other => Err(OnCallError::model_unavailable(
            codes::LLM_PROVIDER_UNSUPPORTED,
            format!("Provider not supported: {}", other),
        )),
    }
}

/// Builds the prompt, calls the model and normalizes its answer.
pub struct LlmAnalyzer {
    provider: Box<dyn AIProvider>,
    max_entries: usize,
}

impl LlmAnalyzer {
    pub fn new(provider: Box<dyn AIProvider>, max_entries: usize) -> Self {
        Self {
            provider,
            max_entries,
        }
    }

    pub fn from_settings(settings: &Settings) -> OnCallResult<Self> {
        let backend = create_backend(settings)?;
        Ok(Self::new(
            Box::new(backend),
            settings.max_log_entries_to_analyze,
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.get_provider_name()
    }

    /// Only transport failures are errors; an unparsable answer degrades to
    /// the fallback analysis.
    pub async fn analyze(
        &self,
        entries: &[LogEntry],
        statistics: &Statistics,
    ) -> OnCallResult<ModelAnalysis> {
        info!(
            log_count = entries.len(),
            provider = self.provider_name(),
            "Starting LLM log analysis"
        );

        let prompt = SystemPromptGenerator::build_prompt(entries, statistics, self.max_entries);

        let text = self.provider.complete(&prompt).await.map_err(|e| {
            error!(error = %e, "LLM analysis failed");
            OnCallError::ModelInvocationFailed {
                code: codes::LLM_ANALYSIS_ERROR,
                message: format!("Failed to analyze logs with LLM: {}", e),
                source: Some(Box::new(e)),
            }
        })?;

        let analysis = ModelAnalysis::from(parse_model_response(&text));
        info!(
            findings = analysis.findings.len(),
            "LLM analysis completed successfully"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Canned provider that records every prompt it receives.
    pub struct StaticProvider {
        pub reply: Result<String, String>,
        pub prompts: Arc<Mutex<Vec<Prompt>>>,
    }

    impl StaticProvider {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl AIProvider for StaticProvider {
        async fn complete(&self, prompt: &Prompt) -> Result<String, AIError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.reply.clone().map_err(AIError::InvalidResponse)
        }

        fn get_provider_name(&self) -> &str {
            "static"
        }
    }
}
