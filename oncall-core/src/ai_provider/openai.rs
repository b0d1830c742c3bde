use crate::ai_provider::{AIError, AIProvider, Prompt};
use crate::config::DEFAULT_OPENAI_BASE_URL;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAIProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, AIError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            model: super::DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 4096,
        })
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, AIError> {
        let openai_request = OpenAIRequest {
            model: &self.model,
            messages: vec![
                OpenAIMessage {
                    role: "system",
                    content: &prompt.system,
                },
                OpenAIMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await?;

        if response.status() == 401 {
            return Err(AIError::AuthenticationError);
        }

        if response.status() == 429 {
            return Err(AIError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AIError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AIError::InvalidResponse("No choices in response".to_string()))
    }

    fn get_provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn provider(server: &mockito::ServerGuard) -> OpenAIProvider {
        OpenAIProvider::new("test_key".to_string(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url())
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "You are a log analyst.".to_string(),
            user: "Analyze these logs.".to_string(),
        }
    }

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("test_key".to_string(), Duration::from_secs(5)).unwrap();
        assert_eq!(provider.api_key, "test_key");
        assert_eq!(provider.model(), "gpt-4");
        assert!(!format!("{:?}", provider).contains("test_key"));
    }

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test_key")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "You are a log analyst."},
                    {"role": "user", "content": "Analyze these logs."}
                ]
            })))
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "{\"summary\": \"ok\"}"}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let text = provider(&server).complete(&prompt()).await.unwrap();
        assert_eq!(text, r#"{"summary": "ok"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_maps_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .create_async()
            .await;
        let err = provider(&server).complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AIError::AuthenticationError));

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;
        let err = provider(&server).complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, AIError::InvalidResponse(_)));
    }
}
