//! AI provider selection and credentials

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidProviderError;

/// Where enhancement requests are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// llama-server running on this machine
    #[default]
    Local,
    OpenAi,
    Anthropic,
}

impl AiProvider {
    /// Get the string identifier for this provider
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Whether requests to this provider need an API key
    pub const fn requires_key(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl FromStr for AiProvider {
    type Err = InvalidProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(InvalidProviderError { input: s.to_string() }),
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Secret material for cloud providers
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

// Keep keys out of debug logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"***").finish()
    }
}

/// Provider choice a session uses for every enhancement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhanceSettings {
    pub provider: AiProvider,
    pub credentials: Option<Credentials>,
    /// Model override; each provider has its own default
    pub model: Option<String>,
}
