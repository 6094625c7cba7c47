//! Config file port

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Where `brief` keeps its user settings
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the settings file. A missing file yields an empty config.
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    /// Replace the settings file with `config`
    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write a default settings file; refuses to overwrite an existing one
    async fn init(&self) -> Result<(), ConfigError>;
}
