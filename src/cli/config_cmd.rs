//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, AudioConfig};
use crate::domain::duration::Duration;
use crate::domain::enhance::AiProvider;
use crate::domain::error::ConfigError;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            key: key.to_string(),
            message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
        })
    }
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value.to_string());
    store.save(&config).await?;

    let shown = if is_secret(key) {
        mask_api_key(value)
    } else {
        value.to_string()
    };
    presenter.success(&format!("{} = {}", key, shown));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;
    presenter.output(&display_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &display_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()),
        );
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn is_secret(key: &str) -> bool {
    key.ends_with("api_key")
}

fn audio_mut(config: &mut AppConfig) -> &mut AudioConfig {
    config.audio.get_or_insert_with(AudioConfig::default)
}

/// Store a validated value under `key`
fn set_value(config: &mut AppConfig, key: &str, value: String) {
    match key {
        "data_dir" => config.data_dir = Some(value),
        "provider" => config.provider = Some(value.to_lowercase()),
        "openai_api_key" => config.openai_api_key = Some(value),
        "anthropic_api_key" => config.anthropic_api_key = Some(value),
        "model" => config.model = Some(value),
        "local_url" => config.local_url = Some(value.trim_end_matches('/').to_string()),
        "autosave_delay" => config.autosave_delay = Some(value),
        "backend_timeout" => config.backend_timeout = Some(value),
        "download_timeout" => config.download_timeout = Some(value),
        "audio.ffmpeg_bin" => audio_mut(config).ffmpeg_bin = Some(value),
        "audio.whisper_bin" => audio_mut(config).whisper_bin = Some(value),
        "audio.input_format" => audio_mut(config).input_format = Some(value),
        "audio.input_device" => audio_mut(config).input_device = Some(value),
        _ => unreachable!(), // Already validated
    }
}

/// Value of `key` as shown to the user, with API keys masked
fn display_value(config: &AppConfig, key: &str) -> Option<String> {
    let audio = config.audio.as_ref();
    match key {
        "data_dir" => config.data_dir.clone(),
        "provider" => config.provider.clone(),
        "openai_api_key" => config.openai_api_key.as_deref().map(mask_api_key),
        "anthropic_api_key" => config.anthropic_api_key.as_deref().map(mask_api_key),
        "model" => config.model.clone(),
        "local_url" => config.local_url.clone(),
        "autosave_delay" => config.autosave_delay.clone(),
        "backend_timeout" => config.backend_timeout.clone(),
        "download_timeout" => config.download_timeout.clone(),
        "audio.ffmpeg_bin" => audio.and_then(|a| a.ffmpeg_bin.clone()),
        "audio.whisper_bin" => audio.and_then(|a| a.whisper_bin.clone()),
        "audio.input_format" => audio.and_then(|a| a.input_format.clone()),
        "audio.input_device" => audio.and_then(|a| a.input_device.clone()),
        _ => None,
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };
    match key {
        "provider" => {
            value
                .parse::<AiProvider>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "autosave_delay" | "backend_timeout" | "download_timeout" => {
            let duration = value
                .parse::<Duration>()
                .map_err(|e| invalid(e.to_string()))?;
            if duration.as_millis() == 0 {
                return Err(invalid("Duration must be greater than zero".to_string()));
            }
        }
        "local_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid("Value must be an http:// or https:// URL".to_string()));
            }
        }
        "data_dir" | "audio.ffmpeg_bin" | "audio.whisper_bin" => {
            if value.trim().is_empty() {
                return Err(invalid("Value must not be empty".to_string()));
            }
        }
        _ => {} // free-form strings
    }
    Ok(())
}

/// Mask API key for display (show first 4 and last 4 chars)
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
