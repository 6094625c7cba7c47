//! HTTP enhancer adapter
//!
//! Sends the mode prompt to a local llama-server, the OpenAI chat completions
//! API or the Anthropic messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::application::ports::{EnhanceError, EnhanceRequest, Enhancer};
use crate::domain::config::DEFAULT_LOCAL_URL;
use crate::domain::enhance::AiProvider;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Token budget for generated text
const MAX_TOKENS: u32 = 2048;

// llama-server

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

// OpenAI / Anthropic share the message shape

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Base URLs of the three providers
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub local: String,
    pub openai: String,
    pub anthropic: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            local: DEFAULT_LOCAL_URL.to_string(),
            openai: OPENAI_BASE_URL.to_string(),
            anthropic: ANTHROPIC_BASE_URL.to_string(),
        }
    }
}

/// Enhancer backed by HTTP model APIs
pub struct HttpEnhancer {
    endpoints: Endpoints,
    client: reqwest::Client,
}

impl HttpEnhancer {
    /// Create an enhancer talking to the public cloud APIs and the given
    /// local llama-server
    pub fn new(local_url: impl Into<String>) -> Self {
        Self::with_endpoints(Endpoints {
            local: local_url.into(),
            ..Endpoints::default()
        })
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            client: reqwest::Client::new(),
        }
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    /// Map HTTP failures the same way for every provider
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EnhanceError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(EnhanceError::InvalidApiKey);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EnhanceError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EnhanceError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    fn api_key(request: &EnhanceRequest) -> Result<&str, EnhanceError> {
        request
            .credentials
            .as_ref()
            .map(|c| c.api_key())
            .filter(|key| !key.is_empty())
            .ok_or(EnhanceError::MissingApiKey(request.provider))
    }

    async fn call_local(&self, prompt: &str) -> Result<Option<String>, EnhanceError> {
        let body = CompletionRequest {
            prompt,
            n_predict: MAX_TOKENS,
            stream: false,
        };

        let response = self
            .client
            .post(Self::url(&self.endpoints.local, "completion"))
            .json(&body)
            .send()
            .await
            .map_err(|e| EnhanceError::Unavailable(e.to_string()))?;

        let response: CompletionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EnhanceError::ParseError(e.to_string()))?;

        Ok(Some(response.content))
    }

    async fn call_openai(
        &self,
        prompt: &str,
        api_key: &str,
        model: Option<&str>,
    ) -> Result<Option<String>, EnhanceError> {
        let body = ChatRequest {
            model: model.unwrap_or(OPENAI_DEFAULT_MODEL),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(Self::url(&self.endpoints.openai, "chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnhanceError::RequestFailed(e.to_string()))?;

        let response: ChatResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EnhanceError::ParseError(e.to_string()))?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }

    async fn call_anthropic(
        &self,
        prompt: &str,
        api_key: &str,
        model: Option<&str>,
    ) -> Result<Option<String>, EnhanceError> {
        let body = MessagesRequest {
            model: model.unwrap_or(ANTHROPIC_DEFAULT_MODEL),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(Self::url(&self.endpoints.anthropic, "messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnhanceError::RequestFailed(e.to_string()))?;

        let response: MessagesResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EnhanceError::ParseError(e.to_string()))?;

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        Ok(Some(text))
    }
}

#[async_trait]
impl Enhancer for HttpEnhancer {
    async fn enhance(&self, request: &EnhanceRequest) -> Result<String, EnhanceError> {
        let prompt = request.mode.prompt(&request.content);
        let model = request.model.as_deref();

        let text = match request.provider {
            AiProvider::Local => self.call_local(&prompt).await?,
            AiProvider::OpenAi => {
                let key = Self::api_key(request)?;
                self.call_openai(&prompt, key, model).await?
            }
            AiProvider::Anthropic => {
                let key = Self::api_key(request)?;
                self.call_anthropic(&prompt, key, model).await?
            }
        };

        let text = text.unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EnhanceError::EmptyResponse(request.provider));
        }
        Ok(trimmed.to_string())
    }
}
