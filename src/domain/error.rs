//! Domain error types

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>ms, <number>s, <number>m, or <number>m<number>s (e.g., 800ms, 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when an unknown enhancement mode is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid enhance mode: \"{input}\". Valid modes are: polish, summarize, action_items, decisions")]
pub struct InvalidEnhanceModeError {
    pub input: String,
}

/// Error when an unknown AI provider is provided
#[derive(Debug, Clone, Error)]
#[error("Invalid provider: \"{input}\". Valid providers are: local, openai, anthropic")]
pub struct InvalidProviderError {
    pub input: String,
}

/// Error when a note id is malformed
#[derive(Debug, Clone, Error)]
#[error("Invalid note id: \"{input}\". Ids may only contain letters, digits, '-' and '_'")]
pub struct InvalidNoteIdError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
