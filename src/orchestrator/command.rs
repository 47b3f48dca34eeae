//! Command surface: typed requests and the uniform response shape.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommandError;
use crate::prompt::Mode;
use crate::store::HistoryEntry;

/// A request from the presentation layer.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "RUN")]
    Run {
        #[serde(default)]
        mode: Mode,
    },
    #[serde(rename = "SAVE_KEY")]
    SaveKey {
        #[serde(rename = "apiKey", default)]
        api_key: Option<SecretString>,
    },
    #[serde(rename = "GET_HISTORY")]
    GetHistory {
        #[serde(default)]
        domain: String,
    },
}

impl Command {
    /// Decode a raw message. Anything that is not a known, well-formed
    /// command is `UnknownCommand`.
    pub fn parse(message: Value) -> Result<Self, CommandError> {
        serde_json::from_value(message).map_err(|_| CommandError::UnknownCommand)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Run { .. } => "RUN",
            Command::SaveKey { .. } => "SAVE_KEY",
            Command::GetHistory { .. } => "GET_HISTORY",
        }
    }
}

/// Result of a successful RUN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub domain: String,
    pub result: String,
    pub title: String,
    pub url: String,
}

/// Uniform reply: `ok` plus whichever fields the command produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

impl CommandResponse {
    /// Bare `{ok: true}`.
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub fn error(err: &CommandError) -> Self {
        Self {
            ok: false,
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    pub fn run(outcome: RunOutcome) -> Self {
        Self {
            ok: true,
            domain: Some(outcome.domain),
            result: Some(outcome.result),
            title: Some(outcome.title),
            url: Some(outcome.url),
            ..Self::default()
        }
    }

    pub fn history(history: Vec<HistoryEntry>) -> Self {
        Self {
            ok: true,
            history: Some(history),
            ..Self::default()
        }
    }
}
