//! Text transformation port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::enhance::{AiProvider, Credentials, EnhanceMode};

/// Enhancement errors
#[derive(Debug, Clone, Error)]
pub enum EnhanceError {
    #[error("{0} API key required")]
    MissingApiKey(AiProvider),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Local AI not available: {0}")]
    Unavailable(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Empty response from {0}")]
    EmptyResponse(AiProvider),
}

/// One enhancement call
#[derive(Debug, Clone)]
pub struct EnhanceRequest {
    pub content: String,
    pub mode: EnhanceMode,
    pub provider: AiProvider,
    pub credentials: Option<Credentials>,
    pub model: Option<String>,
}

/// Port for AI text transformation
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Rewrite the request content according to its mode.
    ///
    /// # Returns
    /// The transformed text or an error
    async fn enhance(&self, request: &EnhanceRequest) -> Result<String, EnhanceError>;
}
