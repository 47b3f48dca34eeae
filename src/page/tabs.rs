//! Tab host: owns open pages and runs one extractor task per tab.
//!
//! Each tab's page context is a tokio task that answers `GET_PAGE` requests
//! arriving over an mpsc channel. Every request carries its own oneshot
//! reply sender, so answers always go back to the caller that asked.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PageProvider, PageReply, PageSnapshot, TabId, extract_snapshot};
use crate::error::{CommandError, PageError};

/// Queue depth of a page context's request channel.
const PAGE_CHANNEL_CAPACITY: usize = 16;

/// Request sent to a page context.
#[derive(Debug)]
pub enum PageRequest {
    GetPage { reply: oneshot::Sender<PageReply> },
}

struct Tab {
    id: TabId,
    url: String,
    html: Arc<str>,
    opened_at: DateTime<Utc>,
    /// Present once the extractor has been injected.
    context: Option<mpsc::Sender<PageRequest>>,
}

impl Tab {
    fn extractor_loaded(&self) -> bool {
        self.context.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Only ordinary web and file pages accept script injection.
    fn accepts_injection(&self) -> bool {
        url::Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https" | "file"))
            .unwrap_or(false)
    }
}

/// Public view of an open tab.
#[derive(Debug, Clone, Serialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub active: bool,
    pub extractor_loaded: bool,
    pub opened_at: DateTime<Utc>,
}

#[derive(Default)]
struct TabState {
    tabs: Vec<Tab>,
    active: Option<TabId>,
}

impl TabState {
    fn find_mut(&mut self, id: TabId) -> Result<&mut Tab, PageError> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PageError::TabNotFound { id: id.to_string() })
    }
}

/// The single window of open tabs, with at most one active.
pub struct TabHost {
    state: RwLock<TabState>,
    client: reqwest::Client,
}

impl TabHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(TabState::default()),
            client: reqwest::Client::new(),
        })
    }

    /// Register a page whose HTML is already known.
    pub async fn open(&self, url: &str, html: &str, activate: bool) -> TabId {
        let id = Uuid::new_v4();
        let tab = Tab {
            id,
            url: url.to_string(),
            html: Arc::from(html),
            opened_at: Utc::now(),
            context: None,
        };

        let mut state = self.state.write().await;
        state.tabs.push(tab);
        if activate || state.active.is_none() {
            state.active = Some(id);
        }
        info!(tab_id = %id, url = %url, active = state.active == Some(id), "Tab opened");
        id
    }

    /// Fetch `url` over HTTP and register the result as a tab.
    pub async fn open_url(&self, url: &str, activate: bool) -> Result<TabId, PageError> {
        let fetch_err = |reason: String| PageError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", resp.status())));
        }

        // Keep the post-redirect URL, as a browser would show it.
        let final_url = resp.url().to_string();
        let html = resp.text().await.map_err(|e| fetch_err(e.to_string()))?;

        Ok(self.open(&final_url, &html, activate).await)
    }

    /// Make `id` the active tab.
    pub async fn activate(&self, id: TabId) -> Result<(), PageError> {
        let mut state = self.state.write().await;
        state.find_mut(id)?;
        state.active = Some(id);
        debug!(tab_id = %id, "Tab activated");
        Ok(())
    }

    /// Close a tab. Dropping its sender stops the page context task.
    pub async fn close(&self, id: TabId) -> Result<(), PageError> {
        let mut state = self.state.write().await;
        let before = state.tabs.len();
        state.tabs.retain(|t| t.id != id);
        if state.tabs.len() == before {
            return Err(PageError::TabNotFound { id: id.to_string() });
        }
        if state.active == Some(id) {
            state.active = None;
        }
        info!(tab_id = %id, "Tab closed");
        Ok(())
    }

    /// All open tabs in the order they were opened.
    pub async fn list(&self) -> Vec<TabInfo> {
        let state = self.state.read().await;
        state
            .tabs
            .iter()
            .map(|t| TabInfo {
                id: t.id,
                url: t.url.clone(),
                active: state.active == Some(t.id),
                extractor_loaded: t.extractor_loaded(),
                opened_at: t.opened_at,
            })
            .collect()
    }

    /// Load the extractor into a tab if it is not already running there.
    pub async fn ensure_extractor(&self, id: TabId) -> Result<mpsc::Sender<PageRequest>, PageError> {
        let mut state = self.state.write().await;
        let tab = state.find_mut(id)?;

        if !tab.accepts_injection() {
            return Err(PageError::InjectionRefused {
                url: tab.url.clone(),
            });
        }

        if let Some(tx) = tab.context.as_ref().filter(|tx| !tx.is_closed()) {
            return Ok(tx.clone());
        }

        let tx = spawn_page_context(id, tab.url.clone(), Arc::clone(&tab.html));
        tab.context = Some(tx.clone());
        debug!(tab_id = %id, "Extractor injected");
        Ok(tx)
    }

    /// Ask a tab's page context for a snapshot.
    pub async fn request_snapshot(&self, id: TabId) -> Result<PageReply, PageError> {
        let tx = self.ensure_extractor(id).await?;
        let unreachable = || PageError::Unreachable { id: id.to_string() };

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(PageRequest::GetPage { reply: reply_tx })
            .await
            .map_err(|_| unreachable())?;
        reply_rx.await.map_err(|_| unreachable())
    }
}

fn spawn_page_context(id: TabId, url: String, html: Arc<str>) -> mpsc::Sender<PageRequest> {
    let (tx, mut rx) = mpsc::channel::<PageRequest>(PAGE_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            match request {
                PageRequest::GetPage { reply } => {
                    let snapshot = extract_snapshot(&html, &url);
                    debug!(tab_id = %id, chars = snapshot.text.chars().count(), "GET_PAGE served");
                    // Caller may have gone away; nothing to do then.
                    let _ = reply.send(PageReply::ok(snapshot));
                }
            }
        }
        debug!(tab_id = %id, "Page context stopped");
    });

    tx
}

#[async_trait]
impl PageProvider for TabHost {
    async fn active_tab(&self) -> Result<TabId, CommandError> {
        let state = self.state.read().await;
        state
            .active
            .filter(|id| state.tabs.iter().any(|t| t.id == *id))
            .ok_or(CommandError::NoActiveTab)
    }

    async fn snapshot(&self, tab: TabId) -> Result<PageSnapshot, CommandError> {
        match self.request_snapshot(tab).await {
            Ok(reply) => reply.into_snapshot().ok_or(CommandError::ExtractionFailed),
            Err(e) => {
                warn!(tab_id = %tab, error = %e, "Page read failed");
                Err(CommandError::ExtractionFailed)
            }
        }
    }
}
