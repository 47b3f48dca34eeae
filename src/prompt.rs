//! Modes and prompt composition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::page::PageSnapshot;

/// Fixed preamble placed ahead of every task.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful research assistant. Be concise. Use bullet points. Do not invent facts. If missing, say 'Not found on this page'.";

/// Instruction template selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Summarize,
    Requirements,
    Dates,
    NextClicks,
    Checklist,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Summarize,
        Mode::Requirements,
        Mode::Dates,
        Mode::NextClicks,
        Mode::Checklist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Summarize => "summarize",
            Mode::Requirements => "requirements",
            Mode::Dates => "dates",
            Mode::NextClicks => "nextclicks",
            Mode::Checklist => "checklist",
        }
    }

    /// The task line sent to the model for this mode.
    pub fn instruction(&self) -> &'static str {
        match self {
            Mode::Summarize => "Summarize this page in 6 to 10 bullets.",
            Mode::Requirements => {
                "Extract any requirements, eligibility, or needed materials. If none, say so."
            }
            Mode::Dates => {
                "Extract any dates, deadlines, timelines, or time-related info. If none, say so."
            }
            Mode::NextClicks => {
                "Suggest 5 to 8 next links or sections a person should look for next based on this page (example: cost, requirements, deadlines, contact)."
            }
            Mode::Checklist => {
                "Create a checklist of action items a person should do after reading this page."
            }
        }
    }

    /// Parse a mode name, falling back to `Summarize` for anything unknown.
    pub fn from_name(name: Option<&str>) -> Self {
        name.and_then(|n| n.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown mode: {s}"))
    }
}

// Lenient: stored history and incoming commands never fail on a bad mode.
impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Mode::from_name(raw.as_str()))
    }
}

/// Compose the single prompt string sent to the model.
pub fn build_prompt(mode: Mode, page: &PageSnapshot) -> String {
    format!(
        "{SYSTEM_PREAMBLE}\n\nTASK: {task}\n\nPAGE TITLE: {title}\nPAGE URL: {url}\n\nPAGE TEXT (may be truncated):\n{text}",
        task = mode.instruction(),
        title = page.title,
        url = page.url,
        text = page.text,
    )
}
