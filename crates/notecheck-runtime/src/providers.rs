//! Text-generation providers.
//!
//! The pipeline only needs one capability from a backend: send a prompt,
//! get text back. [`TextGenerator`] is that seam; HTTP clients for the
//! Anthropic Messages API and OpenAI-compatible chat completions implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ProviderConfig, ProviderKind};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors from a text-generation backend.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider misconfigured: {0}")]
    Configuration(String),
}

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply of at most `max_tokens` tokens.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;

    /// Provider name for report metadata.
    fn provider_name(&self) -> &str;

    /// Model identifier for report metadata.
    fn model_id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_http_client(config: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy_url) = config.proxy_url.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ProviderError::Configuration(format!("invalid proxy_url: {}", e)))?;
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    temperature: f32,
}

impl AnthropicClient {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_BASE_URL.to_string()),
            api_key,
            model_id: config.model_id.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        tracing::debug!(model = %self.model_id, max_tokens, "Calling Anthropic API");

        let request = AnthropicRequest {
            model: &self.model_id,
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let parsed: AnthropicResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {}", e)))?;

        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ProviderError::InvalidResponse("empty response from API".to_string()))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            model_id: config.model_id.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        tracing::debug!(model = %self.model_id, max_tokens, "Calling chat completions API");

        let request = OpenAiRequest {
            model: &self.model_id,
            max_tokens,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let parsed: OpenAiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("empty response from API".to_string()))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Build the configured provider.
///
/// The config should already have passed [`RuntimeConfig::validate`](crate::RuntimeConfig::validate);
/// a missing key is still reported rather than sent.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn TextGenerator>, ProviderError> {
    let api_key = config
        .resolve_api_key()
        .ok_or_else(|| ProviderError::Configuration("api_key is required".to_string()))?;

    let provider: Arc<dyn TextGenerator> = match config.kind() {
        Some(ProviderKind::Anthropic) => Arc::new(AnthropicClient::new(config, api_key)?),
        Some(ProviderKind::OpenAi) => Arc::new(OpenAiClient::new(config, api_key)?),
        None => {
            return Err(ProviderError::Configuration(format!(
                "unsupported provider: {}",
                config.provider_type
            )))
        }
    };

    tracing::info!(
        provider = provider.provider_name(),
        model = provider.model_id(),
        "Text-generation provider ready"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider_type: &str) -> ProviderConfig {
        ProviderConfig {
            provider_type: provider_type.to_string(),
            model_id: "model-x".to_string(),
            api_key: Some("secret".to_string()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_build_anthropic_provider() {
        let provider = build_provider(&config("anthropic")).unwrap();
        assert_eq!(provider.provider_name(), "anthropic");
        assert_eq!(provider.model_id(), "model-x");
    }

    #[test]
    fn test_build_openai_provider() {
        let provider = build_provider(&config("openai")).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = build_provider(&config("carrier-pigeon")).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_missing_key_rejected() {
        let mut config = config("openai");
        config.api_key = None;
        config.api_key_env = Some("NOTECHECK_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        assert!(matches!(
            build_provider(&config),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_response_shapes_parse() {
        let anthropic: AnthropicResponse = serde_json::from_str(
            r#"{"id":"msg","content":[{"type":"text","text":"STATUS: present"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(anthropic.content[0].text.as_deref(), Some("STATUS: present"));

        let openai: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"STATUS: missing"}}]}"#,
        )
        .unwrap();
        assert_eq!(openai.choices[0].message.content.as_deref(), Some("STATUS: missing"));
    }
}
