//! Page context: snapshots, text extraction, and the tab host.

pub mod extractor;
pub mod tabs;

pub use extractor::{MAX_TEXT_CHARS, extract_snapshot};
pub use tabs::{TabHost, TabInfo};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommandError;

/// Identifier of an open tab.
pub type TabId = Uuid;

/// One-shot capture of a page: title, URL, and extracted visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub text: String,
}

/// Answer to a `GET_PAGE` request from a page context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReply {
    pub ok: bool,
    #[serde(flatten)]
    pub snapshot: Option<PageSnapshot>,
}

impl PageReply {
    pub fn ok(snapshot: PageSnapshot) -> Self {
        Self {
            ok: true,
            snapshot: Some(snapshot),
        }
    }

    pub fn not_ok() -> Self {
        Self {
            ok: false,
            snapshot: None,
        }
    }

    /// The snapshot, if the page answered `ok`.
    pub fn into_snapshot(self) -> Option<PageSnapshot> {
        if self.ok { self.snapshot } else { None }
    }
}

/// A source of page snapshots for the orchestrator.
///
/// Satisfied by [`TabHost`] in the server; tests substitute counting fakes.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// The currently active target, or `NoActiveTab`.
    async fn active_tab(&self) -> Result<TabId, CommandError>;

    /// Ensure the extractor runs in `tab` and ask it for a snapshot.
    async fn snapshot(&self, tab: TabId) -> Result<PageSnapshot, CommandError>;
}

/// Root domain used to partition history.
///
/// Keeps the last two dot-separated labels; hostnames with two labels or
/// fewer (empty labels ignored) come back unchanged.
pub fn root_domain(hostname: &str) -> String {
    let parts: Vec<&str> = hostname.split('.').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 2 {
        return hostname.to_string();
    }
    parts[parts.len() - 2..].join(".")
}

/// Root domain of a page URL. Errors when the URL does not parse.
pub fn domain_of(page_url: &str) -> Result<String, CommandError> {
    let parsed =
        url::Url::parse(page_url).map_err(|_| CommandError::InvalidPageUrl(page_url.to_string()))?;
    Ok(root_domain(parsed.host_str().unwrap_or_default()))
}
