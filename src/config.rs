//! Configuration types.

use std::path::PathBuf;

/// Default remote completion endpoint (Responses API shape).
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/responses";

/// Default model identifier sent with every completion request.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port for the HTTP/WebSocket command server.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Model identifier for the completion endpoint.
    pub model: String,
    /// Completion endpoint URL.
    pub api_url: String,
    /// Directory for daily-rolling log files. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/page-assist.db"),
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Build from `PAGE_ASSIST_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port: u16 = std::env::var("PAGE_ASSIST_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let db_path = std::env::var("PAGE_ASSIST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let model = std::env::var("PAGE_ASSIST_MODEL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.model);

        let api_url = std::env::var("PAGE_ASSIST_API_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.api_url);

        let log_dir = std::env::var("PAGE_ASSIST_LOG_DIR").ok().map(PathBuf::from);

        Self {
            port,
            db_path,
            model,
            api_url,
            log_dir,
        }
    }
}
