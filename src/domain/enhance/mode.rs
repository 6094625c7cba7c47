//! Enhancement mode value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::InvalidEnhanceModeError;

/// All available enhancement modes
pub const ALL_MODES: &[EnhanceMode] = &[
    EnhanceMode::Polish,
    EnhanceMode::Summarize,
    EnhanceMode::ActionItems,
    EnhanceMode::Decisions,
];

/// The ways a note can be rewritten by the transformation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceMode {
    #[default]
    Polish,
    Summarize,
    ActionItems,
    Decisions,
}

impl EnhanceMode {
    /// Get the human-readable label for this mode
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Polish => "Polish notes",
            Self::Summarize => "Summarize",
            Self::ActionItems => "Action items",
            Self::Decisions => "Decisions",
        }
    }

    /// Get the string identifier for this mode
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Polish => "polish",
            Self::Summarize => "summarize",
            Self::ActionItems => "action_items",
            Self::Decisions => "decisions",
        }
    }

    /// Instruction sent ahead of the note content
    pub const fn instruction(&self) -> &'static str {
        match self {
            Self::Polish => "You are a meeting notes editor. Polish the following raw notes: fix grammar, add structure with headers, keep the author's voice. Output only the improved notes in Markdown.",
            Self::Summarize => "Summarize the following meeting notes in 3-5 concise bullet points. Output only the bullets in Markdown.",
            Self::ActionItems => "Extract all action items from the following meeting notes. For each, note the owner if mentioned and any deadline. Output as a Markdown checklist.",
            Self::Decisions => "Extract all decisions made in the following meeting notes. Output as a Markdown list.",
        }
    }

    /// Build the full prompt for `content`
    pub fn prompt(&self, content: &str) -> String {
        format!("{}\n\n{}", self.instruction(), content)
    }
}

impl FromStr for EnhanceMode {
    type Err = InvalidEnhanceModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "polish" => Ok(Self::Polish),
            "summarize" | "summary" => Ok(Self::Summarize),
            "action_items" => Ok(Self::ActionItems),
            "decisions" => Ok(Self::Decisions),
            _ => Err(InvalidEnhanceModeError { input: s.to_string() }),
        }
    }
}

impl fmt::Display for EnhanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_modes() {
        for mode in ALL_MODES {
            assert_eq!(mode.as_str().parse::<EnhanceMode>().unwrap(), *mode);
        }
        assert_eq!("Action-Items".parse::<EnhanceMode>().unwrap(), EnhanceMode::ActionItems);
    }

    #[test]
    fn parse_invalid() {
        let err = "rewrite".parse::<EnhanceMode>().unwrap_err();
        assert!(err.to_string().contains("rewrite"));
    }

    #[test]
    fn prompt_appends_content() {
        let prompt = EnhanceMode::Decisions.prompt("We chose Rust.");
        assert!(prompt.starts_with("Extract all decisions"));
        assert!(prompt.ends_with("\n\nWe chose Rust."));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&EnhanceMode::ActionItems).unwrap();
        assert_eq!(json, "\"action_items\"");
    }
}
