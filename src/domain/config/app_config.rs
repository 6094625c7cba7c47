//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::duration::Duration;
use crate::domain::enhance::{AiProvider, Credentials, EnhanceSettings};

/// Default local llama-server endpoint
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:8080";

/// Name of the notes directory under the home directory
pub const DEFAULT_DATA_DIR_NAME: &str = "Brief";

#[cfg(target_os = "macos")]
const DEFAULT_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "macos")]
const DEFAULT_INPUT_DEVICE: &str = ":0";
#[cfg(not(target_os = "macos"))]
const DEFAULT_INPUT_FORMAT: &str = "pulse";
#[cfg(not(target_os = "macos"))]
const DEFAULT_INPUT_DEVICE: &str = "default";

/// Audio tooling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    pub ffmpeg_bin: Option<String>,
    pub whisper_bin: Option<String>,
    pub input_format: Option<String>,
    pub input_device: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: Option<String>,
    pub provider: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub model: Option<String>,
    pub local_url: Option<String>,
    pub autosave_delay: Option<String>,
    pub backend_timeout: Option<String>,
    pub download_timeout: Option<String>,
    pub audio: Option<AudioConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            data_dir: None,
            provider: Some(AiProvider::Local.to_string()),
            openai_api_key: None,
            anthropic_api_key: None,
            model: None,
            local_url: Some(DEFAULT_LOCAL_URL.to_string()),
            autosave_delay: Some(Duration::default_autosave().to_string()),
            backend_timeout: Some(Duration::default_backend_timeout().to_string()),
            download_timeout: Some(Duration::default_download_timeout().to_string()),
            audio: Some(AudioConfig {
                ffmpeg_bin: Some("ffmpeg".to_string()),
                whisper_bin: Some("whisper-cli".to_string()),
                input_format: Some(DEFAULT_INPUT_FORMAT.to_string()),
                input_device: Some(DEFAULT_INPUT_DEVICE.to_string()),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            data_dir: other.data_dir.or(self.data_dir),
            provider: other.provider.or(self.provider),
            openai_api_key: other.openai_api_key.or(self.openai_api_key),
            anthropic_api_key: other.anthropic_api_key.or(self.anthropic_api_key),
            model: other.model.or(self.model),
            local_url: other.local_url.or(self.local_url),
            autosave_delay: other.autosave_delay.or(self.autosave_delay),
            backend_timeout: other.backend_timeout.or(self.backend_timeout),
            download_timeout: other.download_timeout.or(self.download_timeout),
            audio: Self::merge_audio_config(self.audio, other.audio),
        }
    }

    fn merge_audio_config(
        base: Option<AudioConfig>,
        other: Option<AudioConfig>,
    ) -> Option<AudioConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(AudioConfig {
                ffmpeg_bin: o.ffmpeg_bin.or(b.ffmpeg_bin),
                whisper_bin: o.whisper_bin.or(b.whisper_bin),
                input_format: o.input_format.or(b.input_format),
                input_device: o.input_device.or(b.input_device),
            }),
        }
    }

    /// Notes directory, or `~/Brief` if not set
    pub fn data_dir_or_default(&self) -> PathBuf {
        match self.data_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_DATA_DIR_NAME),
        }
    }

    /// Get provider as parsed AiProvider, or local if not set/invalid
    pub fn provider_or_default(&self) -> AiProvider {
        self.provider
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// API key configured for `provider`, if any
    pub fn credentials_for(&self, provider: AiProvider) -> Option<Credentials> {
        let key = match provider {
            AiProvider::Local => None,
            AiProvider::OpenAi => self.openai_api_key.as_deref(),
            AiProvider::Anthropic => self.anthropic_api_key.as_deref(),
        };
        key.filter(|k| !k.is_empty()).map(Credentials::new)
    }

    /// Provider, credentials and model override for enhancement
    pub fn enhance_settings(&self) -> EnhanceSettings {
        let provider = self.provider_or_default();
        EnhanceSettings {
            provider,
            credentials: self.credentials_for(provider),
            model: self.model.clone().filter(|m| !m.is_empty()),
        }
    }

    pub fn local_url_or_default(&self) -> &str {
        self.local_url.as_deref().unwrap_or(DEFAULT_LOCAL_URL)
    }

    pub fn autosave_delay_or_default(&self) -> Duration {
        parse_or(self.autosave_delay.as_deref(), Duration::default_autosave())
    }

    pub fn backend_timeout_or_default(&self) -> Duration {
        parse_or(
            self.backend_timeout.as_deref(),
            Duration::default_backend_timeout(),
        )
    }

    pub fn download_timeout_or_default(&self) -> Duration {
        parse_or(
            self.download_timeout.as_deref(),
            Duration::default_download_timeout(),
        )
    }

    pub fn ffmpeg_bin_or_default(&self) -> &str {
        self.audio
            .as_ref()
            .and_then(|a| a.ffmpeg_bin.as_deref())
            .unwrap_or("ffmpeg")
    }

    pub fn whisper_bin_or_default(&self) -> &str {
        self.audio
            .as_ref()
            .and_then(|a| a.whisper_bin.as_deref())
            .unwrap_or("whisper-cli")
    }

    pub fn input_format_or_default(&self) -> &str {
        self.audio
            .as_ref()
            .and_then(|a| a.input_format.as_deref())
            .unwrap_or(DEFAULT_INPUT_FORMAT)
    }

    pub fn input_device_or_default(&self) -> &str {
        self.audio
            .as_ref()
            .and_then(|a| a.input_device.as_deref())
            .unwrap_or(DEFAULT_INPUT_DEVICE)
    }
}

fn parse_or(value: Option<&str>, default: Duration) -> Duration {
    value.and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_values() {
        let config = AppConfig::defaults();
        assert_eq!(config.provider, Some("local".to_string()));
        assert_eq!(config.local_url, Some(DEFAULT_LOCAL_URL.to_string()));
        assert_eq!(config.autosave_delay, Some("800ms".to_string()));
        assert_eq!(config.backend_timeout, Some("2m".to_string()));
        assert_eq!(config.download_timeout, Some("30m".to_string()));
        assert_eq!(config.whisper_bin_or_default(), "whisper-cli");
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn empty_has_all_none() {
        let config = AppConfig::empty();
        assert!(config.data_dir.is_none());
        assert!(config.provider.is_none());
        assert!(config.audio.is_none());
    }

    #[test]
    fn merge_other_takes_precedence() {
        let base = AppConfig {
            provider: Some("local".to_string()),
            openai_api_key: Some("base".to_string()),
            autosave_delay: Some("1s".to_string()),
            ..Default::default()
        };
        let other = AppConfig {
            provider: Some("openai".to_string()),
            autosave_delay: None,
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.provider, Some("openai".to_string()));
        assert_eq!(merged.openai_api_key, Some("base".to_string()));
        assert_eq!(merged.autosave_delay, Some("1s".to_string()));
    }

    #[test]
    fn merge_audio_sections() {
        let base = AppConfig {
            audio: Some(AudioConfig {
                ffmpeg_bin: Some("/usr/bin/ffmpeg".to_string()),
                whisper_bin: Some("whisper-cli".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let other = AppConfig {
            audio: Some(AudioConfig {
                whisper_bin: Some("/opt/whisper/main".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = base.merge(other);
        assert_eq!(merged.ffmpeg_bin_or_default(), "/usr/bin/ffmpeg");
        assert_eq!(merged.whisper_bin_or_default(), "/opt/whisper/main");
    }

    #[test]
    fn durations_fall_back_on_invalid() {
        let config = AppConfig {
            autosave_delay: Some("soon".to_string()),
            backend_timeout: Some("45s".to_string()),
            ..Default::default()
        };
        assert_eq!(config.autosave_delay_or_default().as_millis(), 800);
        assert_eq!(config.backend_timeout_or_default().as_secs(), 45);
        assert_eq!(config.download_timeout_or_default().as_secs(), 1800);
    }

    #[test]
    fn enhance_settings_pick_matching_key() {
        let config = AppConfig {
            provider: Some("anthropic".to_string()),
            openai_api_key: Some("sk-openai".to_string()),
            anthropic_api_key: Some("sk-ant".to_string()),
            model: Some(String::new()),
            ..Default::default()
        };
        let settings = config.enhance_settings();
        assert_eq!(settings.provider, AiProvider::Anthropic);
        assert_eq!(settings.credentials.unwrap().api_key(), "sk-ant");
        assert!(settings.model.is_none());
    }

    #[test]
    fn local_provider_has_no_credentials() {
        let config = AppConfig {
            openai_api_key: Some("sk-openai".to_string()),
            ..Default::default()
        };
        assert!(config.enhance_settings().credentials.is_none());
    }

    #[test]
    fn data_dir_override() {
        let config = AppConfig {
            data_dir: Some("/tmp/notes".to_string()),
            ..Default::default()
        };
        assert_eq!(config.data_dir_or_default(), PathBuf::from("/tmp/notes"));
        assert!(AppConfig::empty()
            .data_dir_or_default()
            .ends_with(DEFAULT_DATA_DIR_NAME));
    }
}
