//! CLI argument definitions using Clap

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::enhance::{AiProvider, EnhanceMode};

/// Brief - meeting notes with AI enhancement and local transcription
#[derive(Parser, Debug)]
#[command(name = "brief")]
#[command(version)]
#[command(about = "Meeting notes with AI enhancement and local transcription")]
#[command(long_about = None)]
pub struct Cli {
    /// Notes directory (overrides config and BRIEF_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes, most recently updated first
    List,
    /// Create an empty note
    New {
        /// Note title
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Print a note's content
    Show {
        /// Note id
        id: String,
    },
    /// Delete a note
    Delete {
        /// Note id
        id: String,
    },
    /// Edit a note's content or metadata
    Edit {
        /// Note id
        id: String,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// Replace the content
        #[arg(short, long, conflicts_with = "append")]
        content: Option<String>,
        /// Append a paragraph to the content
        #[arg(short, long)]
        append: Option<String>,
        /// Add a participant (repeatable)
        #[arg(short, long = "participant", value_name = "NAME")]
        participants: Vec<String>,
        /// Add a tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Rewrite a note with AI
    Enhance {
        /// Note id
        id: String,
        /// What to do with the note
        #[arg(short, long, value_enum, default_value_t = ModeArg::Polish)]
        mode: ModeArg,
        /// Provider for this run (overrides config)
        #[arg(short, long, value_enum)]
        provider: Option<ProviderArg>,
    },
    /// Record from the microphone and append the transcript (Ctrl+C stops)
    Record {
        /// Note id
        id: String,
        /// Stop automatically after this long (e.g., 30s, 5m)
        #[arg(short, long, value_name = "TIME")]
        duration: Option<String>,
    },
    /// Manage the local speech model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Speech model actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ModelAction {
    /// Show whether the model is installed
    Status,
    /// Download the model
    Download,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Enhancement mode argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Polish,
    Summarize,
    #[value(name = "action_items", alias = "action-items")]
    ActionItems,
    Decisions,
}

impl From<ModeArg> for EnhanceMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Polish => EnhanceMode::Polish,
            ModeArg::Summarize => EnhanceMode::Summarize,
            ModeArg::ActionItems => EnhanceMode::ActionItems,
            ModeArg::Decisions => EnhanceMode::Decisions,
        }
    }
}

/// Provider argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Local,
    #[value(name = "openai")]
    OpenAi,
    Anthropic,
}

impl From<ProviderArg> for AiProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Local => AiProvider::Local,
            ProviderArg::OpenAi => AiProvider::OpenAi,
            ProviderArg::Anthropic => AiProvider::Anthropic,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "data_dir",
    "provider",
    "openai_api_key",
    "anthropic_api_key",
    "model",
    "local_url",
    "autosave_delay",
    "backend_timeout",
    "download_timeout",
    "audio.ffmpeg_bin",
    "audio.whisper_bin",
    "audio.input_format",
    "audio.input_device",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
