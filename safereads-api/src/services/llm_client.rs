//! Language model client
//!
//! The verdict engine and cover identification talk to the model through
//! the [`VerdictModel`] and [`VisionModel`] traits, so tests can swap in
//! deterministic stubs. [`OpenAiClient`] implements both against the
//! chat-completions API with JSON-object output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

pub const PROVIDER_NAME: &str = "OpenAI";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OpenAI API key is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<LlmError> for safereads_common::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured => safereads_common::Error::Config(err.to_string()),
            LlmError::ApiError(status, message) => safereads_common::Error::Upstream {
                provider: PROVIDER_NAME.to_string(),
                status,
                message,
            },
            LlmError::NetworkError(message) => safereads_common::Error::Upstream {
                provider: PROVIDER_NAME.to_string(),
                status: 0,
                message,
            },
            LlmError::ParseError(message) => safereads_common::Error::ModelParse(message),
        }
    }
}

/// Text model producing a JSON verdict
#[async_trait]
pub trait VerdictModel: Send + Sync {
    /// Raw message content, `None` when the model returned nothing
    async fn complete_json(&self, system_prompt: &str, user_message: &str)
        -> Result<Option<String>, LlmError>;
}

/// Vision model reading a photo
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// `image_data_url` is a `data:<mime>;base64,<payload>` URL
    async fn read_image_json(
        &self,
        instruction: &str,
        image_data_url: &str,
    ) -> Result<Option<String>, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI chat-completions client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    /// Replaceable at runtime through the admin settings endpoint
    api_key: Arc<RwLock<Option<String>>>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: Arc::new(RwLock::new(api_key.filter(|k| !k.is_empty()))),
        })
    }

    pub async fn set_api_key(&self, api_key: String) {
        *self.api_key.write().await = Some(api_key);
        tracing::info!("OpenAI API key updated");
    }

    pub async fn is_configured(&self) -> bool {
        self.api_key.read().await.is_some()
    }

    async fn chat(&self, messages: serde_json::Value) -> Result<Option<String>, LlmError> {
        let api_key = self
            .api_key
            .read()
            .await
            .clone()
            .ok_or(LlmError::NotConfigured)?;

        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": messages,
        });

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, "Calling chat completions");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(status.as_u16(), error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

#[async_trait]
impl VerdictModel for OpenAiClient {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<Option<String>, LlmError> {
        self.chat(json!([
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": user_message },
        ]))
        .await
    }
}

#[async_trait]
impl VisionModel for OpenAiClient {
    async fn read_image_json(
        &self,
        instruction: &str,
        image_data_url: &str,
    ) -> Result<Option<String>, LlmError> {
        self.chat(json!([
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction },
                    { "type": "image_url", "image_url": { "url": image_data_url } },
                ],
            },
        ]))
        .await
    }
}
