//! CLI presenter for output formatting

use chrono::{DateTime, Local, Utc};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::model::DownloadProgress;
use crate::domain::note::{Note, NoteSummary};

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
    download: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self {
            spinner: None,
            download: None,
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Start a percentage bar for the model download.
    /// The bar message is meant for `format_download` output.
    pub fn start_download(&mut self, prefix: &str) -> ProgressBar {
        let bar = ProgressBar::new(100);
        if let Ok(style) =
            ProgressStyle::with_template("{prefix} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("█▓░"));
        }
        bar.set_prefix(prefix.to_string());
        self.download = Some(bar.clone());
        bar
    }

    /// Finish the download bar
    pub fn finish_download(&mut self, ok: bool) {
        if let Some(bar) = self.download.take() {
            if ok {
                bar.finish_with_message(format!("{} Model downloaded", "✓".green()));
            } else {
                bar.abandon();
            }
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list and note headers)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Print the note list, one line per note
    pub fn note_list(&self, notes: &[NoteSummary]) {
        if notes.is_empty() {
            self.info("No notes yet. Create one with `brief new`.");
            return;
        }
        for note in notes {
            self.output(&format_summary(note));
        }
    }

    /// Print a full note: metadata header, blank line, content
    pub fn note(&self, note: &Note) {
        let meta = &note.meta;
        self.key_value("id", note.id.as_str());
        self.key_value("title", &meta.title);
        self.key_value("created", &format_time(meta.created_at));
        self.key_value("updated", &format_time(meta.updated_at));
        if !meta.participants.is_empty() {
            self.key_value("participants", &meta.participants.join(", "));
        }
        if !meta.tags.is_empty() {
            self.key_value("tags", &meta.tags.join(", "));
        }
        println!();
        self.output(&note.content);
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Download progress in human units, e.g. "12.0 MiB / 141.1 MiB"
pub fn format_download(progress: &DownloadProgress) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    format!(
        "{:.1} MiB / {:.1} MiB",
        progress.downloaded as f64 / MIB,
        progress.total as f64 / MIB
    )
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn format_summary(note: &NoteSummary) -> String {
    let title = if note.title.is_empty() {
        "(untitled)".to_string()
    } else {
        note.title.clone()
    };
    format!(
        "{}  {}  {}",
        note.id.as_str().dimmed(),
        format_time(note.updated_at),
        title.bold()
    )
}
