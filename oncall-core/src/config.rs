use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_LOGGING_ENDPOINT: &str = "https://logging.googleapis.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Process-wide settings.
///
/// Resolution order: built-in defaults, then `.oncall.toml` (project) or
/// `~/.config/oncall/config.toml` (user), then environment variables named
/// after the upper-cased field (`GCP_PROJECT_ID`, `OPENAI_API_KEY`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Application
    pub environment: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,

    // GCP
    pub gcp_project_id: Option<String>,
    /// Path to a service-account key file, or the key JSON itself.
    pub gcp_credentials_json: Option<String>,
    pub gcp_access_token: Option<String>,
    pub gcp_log_filter: String,
    pub gcp_log_limit: u32,
    pub gcp_logging_endpoint: String,

    // LLM
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub llm_provider: String,
    pub llm_model: Option<String>,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub openai_base_url: String,
    pub anthropic_base_url: String,

    // Analysis
    pub analysis_output_dir: PathBuf,
    pub max_log_entries_to_analyze: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "INFO".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            gcp_project_id: None,
            gcp_credentials_json: None,
            gcp_access_token: None,
            gcp_log_filter: String::new(),
            gcp_log_limit: 100,
            gcp_logging_endpoint: DEFAULT_LOGGING_ENDPOINT.to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            llm_provider: "openai".to_string(),
            llm_model: None,
            llm_temperature: 0.7,
            llm_max_tokens: 4096,
            llm_timeout_secs: 120,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            analysis_output_dir: PathBuf::from("analysis_reports"),
            max_log_entries_to_analyze: 50,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings = match Self::get_config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env_from(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Overlay values from a variable lookup (the process environment in `load`).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = text("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = text("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = text("HOST") {
            self.host = v;
        }
        parse_into(&text, "PORT", &mut self.port)?;

        if let Some(v) = text("GCP_PROJECT_ID") {
            self.gcp_project_id = Some(v);
        }
        if let Some(v) = text("GCP_CREDENTIALS_JSON") {
            self.gcp_credentials_json = Some(v);
        }
        if let Some(v) = text("GCP_ACCESS_TOKEN") {
            self.gcp_access_token = Some(v);
        }
        if let Some(v) = lookup("GCP_LOG_FILTER") {
            self.gcp_log_filter = v;
        }
        parse_into(&text, "GCP_LOG_LIMIT", &mut self.gcp_log_limit)?;
        if let Some(v) = text("GCP_LOGGING_ENDPOINT") {
            self.gcp_logging_endpoint = v;
        }

        if let Some(v) = text("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = text("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(v);
        }
        if let Some(v) = text("LLM_PROVIDER") {
            self.llm_provider = v;
        }
        if let Some(v) = text("LLM_MODEL") {
            self.llm_model = Some(v);
        }
        parse_into(&text, "LLM_TEMPERATURE", &mut self.llm_temperature)?;
        parse_into(&text, "LLM_MAX_TOKENS", &mut self.llm_max_tokens)?;
        parse_into(&text, "LLM_TIMEOUT_SECS", &mut self.llm_timeout_secs)?;
        if let Some(v) = text("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = text("ANTHROPIC_BASE_URL") {
            self.anthropic_base_url = v;
        }

        if let Some(v) = text("ANALYSIS_OUTPUT_DIR") {
            self.analysis_output_dir = PathBuf::from(v);
        }
        parse_into(
            &text,
            "MAX_LOG_ENTRIES_TO_ANALYZE",
            &mut self.max_log_entries_to_analyze,
        )?;

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn gcp_configured(&self) -> bool {
        self.gcp_project_id.is_some()
    }

    pub fn llm_configured(&self) -> bool {
        self.openai_api_key.is_some() || self.anthropic_api_key.is_some()
    }

    fn get_config_path() -> Option<PathBuf> {
        // Check for project-level config first
        if let Ok(current_dir) = env::current_dir() {
            let project_config = current_dir.join(".oncall.toml");
            if project_config.exists() {
                return Some(project_config);
            }
        }

        // Check for user-level config
        if let Some(home_dir) = dirs::home_dir() {
            let user_config = home_dir.join(".config").join("oncall").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}

fn parse_into<T, F>(text: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = text(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, raw))?;
    }
    Ok(())
}
