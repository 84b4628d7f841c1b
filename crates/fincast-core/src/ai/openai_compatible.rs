//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API.
//! One forecast request maps to exactly one POST to `/v1/chat/completions`
//! with a fixed temperature and token budget, bounded by the client timeout.
//!
//! # Configuration
//!
//! Environment variables:
//! - `FORECAST_PROVIDER_HOST`: Server URL (required)
//! - `FORECAST_PROVIDER_MODEL`: Model name (default: gpt-4o-mini)
//! - `FORECAST_PROVIDER_API_KEY`: Bearer token if required (optional)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

use super::CompletionBackend;

/// OpenAI-compatible completion backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    config: GatewayConfig,
}

impl OpenAICompatibleBackend {
    /// Create a new backend with default gateway settings
    pub fn new(base_url: &str, model: &str) -> Self {
        let config = GatewayConfig {
            model: model.to_string(),
            ..GatewayConfig::default()
        };
        Self::with_config(base_url, None, config)
    }

    /// Create a backend with explicit gateway settings
    pub fn with_config(base_url: &str, api_key: Option<String>, config: GatewayConfig) -> Self {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            config,
        }
    }

    /// Create from environment variables
    ///
    /// Required: `FORECAST_PROVIDER_HOST`
    /// Optional: `FORECAST_PROVIDER_MODEL`, `FORECAST_PROVIDER_API_KEY`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("FORECAST_PROVIDER_HOST").ok()?;
        let mut config = GatewayConfig::default();
        if let Ok(model) = std::env::var("FORECAST_PROVIDER_MODEL") {
            config.model = model;
        }
        let api_key = std::env::var("FORECAST_PROVIDER_API_KEY").ok();
        Some(Self::with_config(&host, api_key, config))
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl CompletionBackend for OpenAICompatibleBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            host = %self.base_url,
            model = %self.config.model,
            prompt_len = user.len(),
            "Sending completion request"
        );

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider { status, body });
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("No choices in provider response".into()))
    }

    async fn health_check(&self) -> bool {
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }
        false
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
