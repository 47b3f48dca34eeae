//! The stored API key.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::traits::KeyValueStore;
use crate::error::DatabaseError;

/// Storage key of the credential, outside the `history:` namespace.
pub const API_KEY_KEY: &str = "apiKey";

/// Process-wide API key. Written by `SAVE_KEY`, read on every run, never
/// returned to callers.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store the key, replacing any previous one.
    pub async fn set(&self, key: &SecretString) -> Result<(), DatabaseError> {
        self.kv
            .set(API_KEY_KEY, &Value::String(key.expose_secret().to_string()))
            .await
    }

    /// The key, or `None` when unset or empty.
    pub async fn get(&self) -> Result<Option<SecretString>, DatabaseError> {
        let value = self.kv.get(API_KEY_KEY).await?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(SecretString::from))
    }
}
