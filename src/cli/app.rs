//! Command runners for the `brief` binary

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use crate::application::ports::{AudioBackend, ConfigStore, Enhancer, NoteStore};
use crate::application::{
    ActionPayload, ModelError, ProgressCallback, RecordAction, SessionError, Workspace,
    WorkspaceError, WorkspaceSettings,
};
use crate::domain::config::AppConfig;
use crate::domain::duration::Duration;
use crate::domain::enhance::{AiProvider, EnhanceMode};
use crate::domain::error::ConfigError;
use crate::domain::model::{DownloadProgress, ModelStatus};
use crate::domain::note::NoteId;
use crate::domain::recording::RecordingState;
use crate::infrastructure::{
    CaptureSettings, HttpEnhancer, MarkdownNoteStore, WhisperCliAudio, XdgConfigStore,
};

use super::args::{Cli, Commands, ModelAction};
use super::config_cmd::handle_config_command;
use super::presenter::{format_download, Presenter};
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// How often `record` checks whether the capture died on its own
const RECORD_POLL: std::time::Duration = std::time::Duration::from_millis(250);

/// Errors surfaced by a command
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Config(ConfigError::ValidationError { .. }) => EXIT_USAGE_ERROR,
            _ => EXIT_ERROR,
        }
    }
}

/// Run a parsed command line to completion
pub async fn run(cli: Cli) -> ExitCode {
    let mut presenter = Presenter::new();
    match dispatch(cli, &mut presenter).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn dispatch(cli: Cli, presenter: &mut Presenter) -> Result<(), CliError> {
    let Cli { data_dir, command } = cli;
    if let Commands::Config { action } = command {
        let store = XdgConfigStore::new();
        return Ok(handle_config_command(action, &store, presenter).await?);
    }

    let provider = match &command {
        Commands::Enhance {
            provider: Some(provider),
            ..
        } => Some(AiProvider::from(*provider)),
        _ => None,
    };
    let cli_config = AppConfig {
        data_dir,
        provider: provider.map(|p| p.to_string()),
        ..Default::default()
    };
    let config = load_merged_config(cli_config).await;
    let workspace = build_workspace(&config);

    match command {
        Commands::List => list(&workspace, presenter).await,
        Commands::New { title } => new_note(&workspace, presenter, title.as_deref()).await,
        Commands::Show { id } => show(&workspace, presenter, &parse_id(&id)?).await,
        Commands::Delete { id } => delete(&workspace, presenter, &parse_id(&id)?).await,
        Commands::Edit {
            id,
            title,
            content,
            append,
            participants,
            tags,
        } => {
            let edits = Edits {
                title,
                content,
                append,
                participants,
                tags,
            };
            edit(&workspace, presenter, &parse_id(&id)?, edits).await
        }
        Commands::Enhance { id, mode, .. } => {
            enhance(&workspace, presenter, &parse_id(&id)?, mode.into(), &config).await
        }
        Commands::Record { id, duration } => {
            let limit = duration
                .map(|d| d.parse::<Duration>())
                .transpose()
                .map_err(|e| CliError::Usage(e.to_string()))?;
            record(&workspace, presenter, &parse_id(&id)?, limit).await
        }
        Commands::Model { action } => model(&workspace, presenter, action).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn parse_id(raw: &str) -> Result<NoteId, CliError> {
    raw.parse::<NoteId>()
        .map_err(|e| CliError::Usage(e.to_string()))
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring config file {}: {}", store.path().display(), e);
            AppConfig::empty()
        }
    };

    let env_config = AppConfig {
        data_dir: non_empty_env("BRIEF_DATA_DIR"),
        openai_api_key: non_empty_env("OPENAI_API_KEY"),
        anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.is_empty())
}

/// Wire the filesystem, HTTP and whisper adapters into a workspace
pub fn build_workspace(config: &AppConfig) -> Workspace {
    let data_dir = config.data_dir_or_default();
    log::debug!("Using notes directory {}", data_dir.display());

    let store: Arc<dyn NoteStore> = Arc::new(MarkdownNoteStore::new(&data_dir));
    let enhancer: Arc<dyn Enhancer> = Arc::new(HttpEnhancer::new(config.local_url_or_default()));
    let audio: Arc<dyn AudioBackend> = Arc::new(WhisperCliAudio::new(
        &data_dir,
        config.whisper_bin_or_default(),
        CaptureSettings {
            ffmpeg_bin: config.ffmpeg_bin_or_default().to_string(),
            input_format: config.input_format_or_default().to_string(),
            input_device: config.input_device_or_default().to_string(),
        },
    ));

    Workspace::new(
        store,
        enhancer,
        audio,
        WorkspaceSettings {
            enhance: config.enhance_settings(),
            autosave_delay: config.autosave_delay_or_default(),
            backend_timeout: config.backend_timeout_or_default(),
            download_timeout: config.download_timeout_or_default(),
        },
    )
}

async fn list(workspace: &Workspace, presenter: &Presenter) -> Result<(), CliError> {
    let notes = workspace.refresh().await?;
    presenter.note_list(&notes);
    Ok(())
}

async fn new_note(
    workspace: &Workspace,
    presenter: &Presenter,
    title: Option<&str>,
) -> Result<(), CliError> {
    let session = workspace.create_note(title).await?;
    workspace.close().await?;
    presenter.success(&format!("Created {}", session.snapshot().meta.title));
    presenter.output(session.id().as_str());
    Ok(())
}

async fn show(workspace: &Workspace, presenter: &Presenter, id: &NoteId) -> Result<(), CliError> {
    let session = workspace.select(id).await?;
    let note = session.snapshot();
    workspace.close().await?;
    presenter.note(&note);
    Ok(())
}

async fn delete(workspace: &Workspace, presenter: &Presenter, id: &NoteId) -> Result<(), CliError> {
    // Surface a missing note instead of silently deleting nothing
    workspace.select(id).await?;
    workspace.delete(id).await?;
    presenter.success(&format!("Deleted {}", id));
    Ok(())
}

/// Edits requested by `brief edit`
struct Edits {
    title: Option<String>,
    content: Option<String>,
    append: Option<String>,
    participants: Vec<String>,
    tags: Vec<String>,
}

impl Edits {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.append.is_none()
            && self.participants.is_empty()
            && self.tags.is_empty()
    }
}

async fn edit(
    workspace: &Workspace,
    presenter: &Presenter,
    id: &NoteId,
    edits: Edits,
) -> Result<(), CliError> {
    if edits.is_empty() {
        return Err(CliError::Usage(
            "Nothing to change. Pass --title, --content, --append, --participant or --tag"
                .to_string(),
        ));
    }

    let session = workspace.select(id).await?;
    if let Some(title) = edits.title {
        session.set_title(title)?;
    }
    if let Some(content) = edits.content {
        session.set_content(content)?;
    }
    if let Some(text) = edits.append {
        session.append(&text)?;
    }
    for name in &edits.participants {
        session.add_participant(name)?;
    }
    for tag in &edits.tags {
        session.add_tag(tag)?;
    }
    workspace.close().await?;

    presenter.success(&format!("Saved {}", id));
    Ok(())
}

async fn enhance(
    workspace: &Workspace,
    presenter: &mut Presenter,
    id: &NoteId,
    mode: EnhanceMode,
    config: &AppConfig,
) -> Result<(), CliError> {
    let settings = config.enhance_settings();
    if settings.provider.requires_key() && settings.credentials.is_none() {
        return Err(CliError::Failed(format!(
            "Missing API key for {}. Set {}_API_KEY or run 'brief config set {}_api_key <key>'",
            settings.provider,
            settings.provider.as_str().to_uppercase(),
            settings.provider
        )));
    }

    let session = workspace.select(id).await?;
    if session.snapshot().content.trim().is_empty() {
        presenter.warn("Note is empty; nothing to enhance");
        return Ok(());
    }

    presenter.start_spinner(&format!(
        "{} with {}...",
        mode.label(),
        settings.provider
    ));
    let result = workspace
        .registry()
        .invoke(id, ActionPayload::Enhance(mode))
        .await
        .into_result();
    match result {
        Ok(()) => {
            presenter.spinner_success(&format!("{} applied", mode.label()));
            workspace.close().await?;
            Ok(())
        }
        Err(e) => {
            presenter.spinner_fail("Enhancement failed");
            workspace.close().await?;
            Err(e.into())
        }
    }
}

async fn ensure_model(workspace: &Workspace, presenter: &mut Presenter) -> Result<(), CliError> {
    presenter.start_spinner("Checking speech model...");
    let status = workspace.model().check().await;
    if status.is_ready() {
        presenter.spinner_success("Speech model ready");
        Ok(())
    } else {
        presenter.spinner_fail("Speech model missing");
        Err(CliError::Failed(
            "Run 'brief model download' before recording".to_string(),
        ))
    }
}

async fn record(
    workspace: &Workspace,
    presenter: &mut Presenter,
    id: &NoteId,
    limit: Option<Duration>,
) -> Result<(), CliError> {
    ensure_model(workspace, presenter).await?;

    let shutdown = ShutdownSignal::new();
    shutdown
        .setup()
        .await
        .map_err(|e| CliError::Failed(format!("Failed to setup signal handler: {}", e)))?;

    let session = workspace.select(id).await?;
    workspace
        .registry()
        .invoke(id, ActionPayload::Record(RecordAction::Start))
        .await
        .into_result()?;

    let hint = match limit {
        Some(limit) => format!("Recording for up to {}... (Ctrl+C to stop)", limit),
        None => "Recording... (Ctrl+C to stop)".to_string(),
    };
    presenter.start_spinner(&hint);

    let deadline = limit.map(|limit| tokio::time::Instant::now() + limit.as_std());
    let mut poll = tokio::time::interval(RECORD_POLL);
    loop {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = expired => break,
            _ = poll.tick() => {
                if session.recording_state() == RecordingState::Idle {
                    presenter.spinner_fail("Recording stopped");
                    let message = session
                        .last_error()
                        .unwrap_or_else(|| "Recording ended unexpectedly".to_string());
                    workspace.close().await?;
                    return Err(CliError::Failed(message));
                }
            }
        }
    }

    presenter.update_spinner("Transcribing...");
    match session.stop_recording().await {
        Ok(Some(transcript)) => {
            presenter.spinner_success("Transcript appended");
            workspace.close().await?;
            presenter.output(&transcript);
            Ok(())
        }
        Ok(None) => {
            presenter.spinner_success("Nothing was said");
            workspace.close().await?;
            Ok(())
        }
        Err(e) => {
            presenter.spinner_fail("Transcription failed");
            workspace.close().await?;
            Err(e.into())
        }
    }
}

async fn model(
    workspace: &Workspace,
    presenter: &mut Presenter,
    action: ModelAction,
) -> Result<(), CliError> {
    let model = workspace.model();
    let status = model.check().await;
    match action {
        ModelAction::Status => {
            presenter.key_value("model", &status.to_string());
            Ok(())
        }
        ModelAction::Download => {
            if status == ModelStatus::Ready {
                presenter.info("Speech model already installed");
                return Ok(());
            }
            let bar = presenter.start_download("Downloading");
            let on_progress: ProgressCallback = Box::new(move |progress: DownloadProgress| {
                bar.set_position(u64::from(progress.percent));
                bar.set_message(format_download(&progress));
            });
            let result = model.download(Some(on_progress)).await;
            presenter.finish_download(result.is_ok());
            Ok(result?)
        }
    }
}
