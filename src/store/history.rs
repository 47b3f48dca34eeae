//! Per-domain result history.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::KeyValueStore;
use crate::error::DatabaseError;
use crate::prompt::Mode;

/// Maximum entries kept per domain.
pub const HISTORY_LIMIT: usize = 50;

const HISTORY_PREFIX: &str = "history:";

/// Storage key for a domain's history list.
pub fn history_key(domain: &str) -> String {
    format!("{HISTORY_PREFIX}{domain}")
}

/// One past result. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Creation time, epoch milliseconds.
    #[serde(alias = "ts", default)]
    pub timestamp: i64,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub output: String,
}

impl HistoryEntry {
    /// New entry stamped with the current time.
    pub fn new(mode: Mode, title: &str, url: &str, output: &str) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            mode,
            title: title.to_string(),
            url: url.to_string(),
            output: output.to_string(),
        }
    }
}

/// Newest-first, bounded history lists keyed by domain.
#[derive(Clone)]
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The domain's list, newest first. Empty when nothing was stored.
    ///
    /// A stored value that is not a list reads as empty, and entries that do
    /// not decode are dropped, so a damaged slot heals on the next append.
    pub async fn get(&self, domain: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
        let Some(Value::Array(items)) = self.kv.get(&history_key(domain)).await? else {
            return Ok(Vec::new());
        };

        let total = items.len();
        let entries: Vec<HistoryEntry> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if entries.len() < total {
            warn!(domain = %domain, dropped = total - entries.len(), "Skipped unreadable history entries");
        }
        Ok(entries)
    }

    /// Prepend `entry`, cap the list at [`HISTORY_LIMIT`], and write it back
    /// as one whole-list replace. Returns the new length.
    pub async fn append(&self, domain: &str, entry: HistoryEntry) -> Result<usize, DatabaseError> {
        let mut history = self.get(domain).await?;
        history.insert(0, entry);
        history.truncate(HISTORY_LIMIT);

        let value = serde_json::to_value(&history)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.kv.set(&history_key(domain), &value).await?;

        debug!(domain = %domain, len = history.len(), "History updated");
        Ok(history.len())
    }

    /// Domains that have a stored history, sorted.
    pub async fn domains(&self) -> Result<Vec<String>, DatabaseError> {
        let keys = self.kv.keys_with_prefix(HISTORY_PREFIX).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(HISTORY_PREFIX).map(str::to_string))
            .collect())
    }

    /// Forget a domain's history. Returns whether anything was stored.
    pub async fn clear(&self, domain: &str) -> Result<bool, DatabaseError> {
        self.kv.delete(&history_key(domain)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LibSqlBackend, MemoryStore};
    use serde_json::json;

    fn store() -> HistoryStore {
        HistoryStore::new(Arc::new(MemoryStore::new()))
    }

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            timestamp: n as i64,
            mode: Mode::Summarize,
            title: format!("page {n}"),
            url: format!("https://example.org/{n}"),
            output: format!("output {n}"),
        }
    }

    #[tokio::test]
    async fn unset_domain_is_empty() {
        assert!(store().get("example.org").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_puts_newest_first() {
        let history = store();
        assert_eq!(history.append("example.org", entry(1)).await.unwrap(), 1);
        assert_eq!(history.append("example.org", entry(2)).await.unwrap(), 2);

        let list = history.get("example.org").await.unwrap();
        assert_eq!(list[0], entry(2));
        assert_eq!(list[1], entry(1));
    }

    #[tokio::test]
    async fn length_is_capped_at_limit() {
        let history = store();
        for n in 0..HISTORY_LIMIT + 7 {
            let before = history.get("example.org").await.unwrap().len();
            let after = history.append("example.org", entry(n)).await.unwrap();
            assert_eq!(after, (before + 1).min(HISTORY_LIMIT));
            assert_eq!(history.get("example.org").await.unwrap()[0], entry(n));
        }

        let list = history.get("example.org").await.unwrap();
        assert_eq!(list.len(), HISTORY_LIMIT);
        // Oldest survivors are the ones appended just before the cap bit.
        assert_eq!(list.last().unwrap(), &entry(7));
    }

    #[tokio::test]
    async fn domains_are_partitioned() {
        let history = store();
        history.append("example.org", entry(1)).await.unwrap();
        history.append("example.com", entry(2)).await.unwrap();

        assert_eq!(history.get("example.org").await.unwrap(), vec![entry(1)]);
        assert_eq!(history.get("example.com").await.unwrap(), vec![entry(2)]);
        assert_eq!(
            history.domains().await.unwrap(),
            vec!["example.com", "example.org"]
        );
    }

    #[tokio::test]
    async fn reads_legacy_ts_field_and_unknown_mode() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(
            "history:example.org",
            &json!([{"ts": 1700000000000i64, "mode": "mystery", "title": "T", "url": "U", "output": "O"}]),
        )
        .await
        .unwrap();

        let list = HistoryStore::new(kv).get("example.org").await.unwrap();
        assert_eq!(list[0].timestamp, 1_700_000_000_000);
        assert_eq!(list[0].mode, Mode::Summarize);
    }

    #[tokio::test]
    async fn non_list_value_reads_as_empty_and_is_replaced() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("history:example.org", &json!({"oops": true}))
            .await
            .unwrap();
        let history = HistoryStore::new(kv);

        assert!(history.get("example.org").await.unwrap().is_empty());
        assert_eq!(history.append("example.org", entry(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn damaged_entries_are_skipped_and_slot_recovers() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(
            "history:example.org",
            &json!([
                {"mode": "dates", "title": "t", "url": "u", "output": "o"},
                {"timestamp": "yesterday", "output": "bad"},
                42,
                {"timestamp": 5, "mode": "checklist", "output": "kept"}
            ]),
        )
        .await
        .unwrap();
        let history = HistoryStore::new(kv);

        let list = history.get("example.org").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].timestamp, 0);
        assert_eq!(list[0].mode, Mode::Dates);
        assert_eq!(list[1].output, "kept");

        assert_eq!(history.append("example.org", entry(9)).await.unwrap(), 3);
        let list = history.get("example.org").await.unwrap();
        assert_eq!(list[0], entry(9));
        assert_eq!(list[2].output, "kept");
    }

    #[tokio::test]
    async fn persisted_layout_is_a_json_array() {
        let kv = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let history = HistoryStore::new(kv.clone());
        history
            .append(
                "example.org",
                HistoryEntry::new(
                    Mode::Dates,
                    "Grant Info",
                    "https://apply.example.org/grants",
                    "- Deadline: June 1",
                ),
            )
            .await
            .unwrap();

        let raw = kv.get("history:example.org").await.unwrap().unwrap();
        let items = raw.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["mode"], "dates");
        assert_eq!(items[0]["output"], "- Deadline: June 1");
        assert!(items[0]["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn clear_removes_domain() {
        let history = store();
        history.append("example.org", entry(1)).await.unwrap();
        assert!(history.clear("example.org").await.unwrap());
        assert!(history.get("example.org").await.unwrap().is_empty());
        assert!(history.domains().await.unwrap().is_empty());
    }
}
