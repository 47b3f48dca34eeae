//! Storage trait: the single persisted key-value namespace.
//!
//! Keys are plain strings (`apiKey`, `history:<domain>`); values are JSON.
//! A `set` replaces the whole value, so readers never observe a partial write.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DatabaseError;

/// Backend-agnostic key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `None` when the key was never set.
    async fn get(&self, key: &str) -> Result<Option<Value>, DatabaseError>;

    /// Insert or replace a value.
    async fn set(&self, key: &str, value: &Value) -> Result<(), DatabaseError>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, DatabaseError>;

    /// Keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError>;
}
