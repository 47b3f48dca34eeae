//! Error types for Page Assist.

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Completion endpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (DNS, connect, TLS, broken body).
    #[error("Completion request failed: {reason}")]
    RequestFailed { reason: String },

    /// Non-2xx answer. `snippet` is at most the first 200 characters of the body.
    #[error("Completion error ({status}): {snippet}")]
    Status { status: u16, snippet: String },

    #[error("Invalid response from completion endpoint: {reason}")]
    InvalidResponse { reason: String },
}

/// Tab host / page context errors.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Tab {id} not found")]
    TabNotFound { id: String },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Page at {url} refused script injection")]
    InjectionRefused { url: String },

    #[error("Page context for tab {id} is unreachable")]
    Unreachable { id: String },
}

/// Errors surfaced to command callers as `{ok:false, error}`.
///
/// The `Display` text is the user-visible message, so the variants that the
/// popup shows verbatim carry fixed strings.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing API key")]
    MissingCredential,

    #[error("No active tab")]
    NoActiveTab,

    #[error("Could not read page")]
    ExtractionFailed,

    #[error("Invalid page URL: {0}")]
    InvalidPageUrl(String),

    #[error("{0}")]
    RemoteCallFailed(#[from] LlmError),

    #[error("{0}")]
    Storage(#[from] DatabaseError),

    #[error("Unknown message")]
    UnknownCommand,
}
